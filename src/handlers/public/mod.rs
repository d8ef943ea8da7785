// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service banner and liveness probe. Neither touches the discovery backend.

use axum::extract::State;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET / - Service banner with the active deployment settings
pub async fn root(State(state): State<AppState>) -> ApiResult<Value> {
    let frontend = &state.config.frontend;

    Ok(ApiResponse::success(json!({
        "name": "FOXDEN frontend",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": format!("{:?}", state.config.environment).to_lowercase(),
        "scope_strategy": state.builder.strategy_name(),
        "check_btrs": frontend.check_btrs,
        "embedded_store": frontend.embedded_store,
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "search": "/search?query=..&idx=..&limit=.. (protected)",
            "datasets": "/datasets?attrs=..&search=..&idx=..&limit=.. (protected)",
            "record": "/record?did=.. (protected)",
        }
    })))
}

/// GET /health - Liveness probe
pub async fn health() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    })))
}
