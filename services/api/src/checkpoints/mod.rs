pub mod handlers;
pub mod responses;

use axum::routing::get;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkpoints", get(handlers::list_checkpoints))
        .route("/checkpoints/{collection}", get(handlers::get_checkpoint))
}
