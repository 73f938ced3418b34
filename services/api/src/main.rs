mod checkpoints;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use quarry_common::types::ServiceInfo;
use quarry_config::{init_tracing, AppConfig};
use quarry_store::checkpoint::CheckpointRepository;
use quarry_store::open_checkpoint_repository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub checkpoints: Arc<dyn CheckpointRepository>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new("quarry-api"))
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .merge(checkpoints::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("failed to load config");
    init_tracing(&config.log_level);
    tracing::info!(service = "quarry-api", "starting");

    let checkpoints =
        open_checkpoint_repository(&config.checkpoint_dir(), config.database_url.as_deref())
            .await
            .expect("failed to open checkpoint store");

    let app = build_router(AppState { checkpoints });
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
