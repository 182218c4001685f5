use crate::server::AppContext;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(list_jobs))
        .route("/tools", get(get_tools))
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "workspace_mode": ctx.runner.mode(),
        "active_jobs": ctx.runner.active_jobs().len(),
    }))
}

async fn list_jobs(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.runner.active_jobs())
}

async fn get_tools(State(ctx): State<AppContext>) -> impl IntoResponse {
    let toolchain = ctx.runner.toolchain().clone();
    match tokio::task::spawn_blocking(move || toolchain.tool_status()).await {
        Ok(tools) => Json(tools).into_response(),
        Err(e) => {
            tracing::error!("Tool check failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
