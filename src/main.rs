use anyhow::Context;
use tracing_subscriber::EnvFilter;

use foxden_frontend::{app, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DISCOVERY_URL, AUTHZ_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();

    let default_filter = if config.api.enable_request_logging {
        "foxden_frontend=debug,tower_http=debug"
    } else {
        "foxden_frontend=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::info!("Starting FOXDEN frontend in {:?} mode", config.environment);
    if config.authz.jwt_secret.is_empty() {
        tracing::warn!("AUTHZ_JWT_SECRET is empty, session tokens cannot be validated");
    }

    let state = AppState::from_config(config.clone()).context("failed to build HTTP client")?;
    tracing::info!(
        "Scope strategy '{}', BTR checks {}, discovery at {}",
        state.builder.strategy_name(),
        if state.scoping_enabled() { "on" } else { "off" },
        config.services.discovery_url
    );

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("FOXDEN frontend listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
