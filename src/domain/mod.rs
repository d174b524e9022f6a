mod email;
mod user;

pub use email::{normalize_email, Email};
pub use user::User;
