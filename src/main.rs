use sso_service::{
    app::{build_app, serve},
    config::AppConfig,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "sso_service=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let (host, port) = (config.host.clone(), config.port);
    let drain_timeout = config.background_timeout;

    let state = AppState::init(config).await?;
    let service = state.service.clone();

    serve(build_app(state), &host, port).await?;

    let pending = service.background().in_flight();
    if tokio::time::timeout(drain_timeout, service.background().drain())
        .await
        .is_err()
    {
        tracing::warn!(pending, "background tasks still running at shutdown");
    }
    tracing::info!("shut down");
    Ok(())
}
