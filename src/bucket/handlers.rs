//! HTTP surface of a bucket. Internal: only the directory talks to it.
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, put},
    Json, Router,
};
use std::sync::Arc;

use super::Bucket;
use crate::{
    cmd::{
        delete::DeleteResponse, empty_key, get::GetResponse, health::BucketHealth, put::Put,
        put::PutResponse,
    },
    error::{Error, Result},
};

pub fn router(bucket: Arc<Bucket>) -> Router {
    Router::new()
        .route("/put", put(handle_put))
        .route("/get/", get(handle_empty_key))
        .route("/get/{*key}", get(handle_get))
        .route("/delete/", delete(handle_empty_key))
        .route("/delete/{*key}", delete(handle_delete))
        .route("/health", get(handle_health))
        .with_state(bucket)
}

async fn handle_put(
    State(bucket): State<Arc<Bucket>>,
    Query(params): Query<Put>,
) -> Result<Json<PutResponse>> {
    Ok(Json(bucket.put(params.key, params.value).await?))
}

async fn handle_get(
    State(bucket): State<Arc<Bucket>>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    Ok(Json(bucket.get(&key).await?))
}

async fn handle_delete(
    State(bucket): State<Arc<Bucket>>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    Ok(Json(bucket.delete(&key).await?))
}

async fn handle_health(State(bucket): State<Arc<Bucket>>) -> Result<Json<BucketHealth>> {
    Ok(Json(bucket.health().await?))
}

/// `{*key}` never matches an empty tail, so `/get/` and `/delete/` land here
async fn handle_empty_key() -> Error {
    empty_key()
}
