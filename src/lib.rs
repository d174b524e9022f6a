pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod perf;
pub mod state;
pub mod store;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;
