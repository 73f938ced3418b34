use quarry_store::checkpoint::CollectionCheckpoint;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CheckpointResponse {
    pub data: CollectionCheckpoint,
}

#[derive(Debug, Serialize)]
pub struct CheckpointListResponse {
    pub data: Vec<CollectionCheckpoint>,
    pub count: usize,
}
