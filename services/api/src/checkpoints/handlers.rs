use axum::extract::{Path, State};
use axum::Json;
use quarry_common::error::QuarryError;
use quarry_common::types::CollectionId;
use quarry_store::checkpoint::{CheckpointRepository, CollectionCheckpoint};

use crate::checkpoints::responses::{CheckpointListResponse, CheckpointResponse};
use crate::error::ApiError;
use crate::AppState;

pub async fn list_checkpoints(
    State(state): State<AppState>,
) -> Result<Json<CheckpointListResponse>, ApiError> {
    let data = state.checkpoints.list().await?;
    let count = data.len();
    Ok(Json(CheckpointListResponse { data, count }))
}

pub async fn get_checkpoint(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<CheckpointResponse>, ApiError> {
    let collection = CollectionId::parse(&raw)?;
    let checkpoint = state
        .checkpoints
        .find(&collection)
        .await?
        .ok_or_else(|| QuarryError::NotFound(format!("no checkpoint for {collection}")))?;

    Ok(Json(CheckpointResponse {
        data: CollectionCheckpoint {
            collection,
            checkpoint,
        },
    }))
}
