//! HTTP surface of the directory. This is the only surface clients talk to.
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, put},
    Json, Router,
};
use std::sync::Arc;

use super::Directory;
use crate::{
    cmd::{
        delete::DeleteResponse, empty_key, get::GetResponse, health::DirectoryHealth, put::Put,
        put::PutResponse, Routed,
    },
    error::{Error, Result},
};

pub fn router(directory: Arc<Directory>) -> Router {
    Router::new()
        .route("/put", put(handle_put))
        .route("/get/", get(handle_empty_key))
        .route("/get/{*key}", get(handle_get))
        .route("/delete/", delete(handle_empty_key))
        .route("/delete/{*key}", delete(handle_delete))
        .route("/health", get(handle_health))
        .with_state(directory)
}

async fn handle_put(
    State(directory): State<Arc<Directory>>,
    Query(params): Query<Put>,
) -> Result<Json<Routed<PutResponse>>> {
    Ok(Json(directory.put(&params.key, &params.value).await?))
}

async fn handle_get(
    State(directory): State<Arc<Directory>>,
    Path(key): Path<String>,
) -> Result<Json<Routed<GetResponse>>> {
    Ok(Json(directory.get(&key).await?))
}

async fn handle_delete(
    State(directory): State<Arc<Directory>>,
    Path(key): Path<String>,
) -> Result<Json<Routed<DeleteResponse>>> {
    Ok(Json(directory.delete(&key).await?))
}

async fn handle_health(State(directory): State<Arc<Directory>>) -> Json<DirectoryHealth> {
    Json(directory.health())
}

/// `{*key}` never matches an empty tail, so `/get/` and `/delete/` land here
async fn handle_empty_key() -> Error {
    empty_key()
}
