use crate::config::Config;
use crate::pipeline::{CliToolchain, JobRunner, MediaToolchain};
use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use stemdub_av::StagingDir;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod error;
pub mod routes_api;
pub mod routes_convert;

pub use error::AppError;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub runner: Arc<JobRunner>,
}

impl AppContext {
    pub fn new(config: Config, toolchain: Arc<dyn MediaToolchain>) -> Self {
        let runner = JobRunner::from_config(toolchain, &config);
        Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
        }
    }
}

pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let files = ServeDir::new(ctx.runner.workspace().path(StagingDir::Output));

    Router::new()
        .route("/health", get(health_check))
        .merge(routes_convert::convert_routes())
        .nest("/api", routes_api::api_routes())
        .nest_service("/files", files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn start_server(config: Config) -> Result<()> {
    let toolchain = CliToolchain::discover(&config);
    start_server_with_toolchain(config, Arc::new(toolchain)).await
}

pub async fn start_server_with_toolchain(
    config: Config,
    toolchain: Arc<dyn MediaToolchain>,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let reset = config.workspace.reset_on_start;
    let ctx = AppContext::new(config, toolchain);
    ctx.runner
        .prepare(reset)
        .context("Failed to prepare workspace")?;

    tracing::info!(
        "Workspace at {} ({:?} mode)",
        ctx.runner.workspace().path(StagingDir::Output).display(),
        ctx.runner.mode()
    );

    let runner = ctx.runner.clone();
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            runner.cancel_all();
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling jobs");
}
