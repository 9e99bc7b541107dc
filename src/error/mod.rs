//! This module defines client/user visible errors that can be returned by bucketdb.
//!
//! Both tiers (bucket and directory) render these errors as HTTP responses with a JSON body
//! `{"error": <kind>, "message": <text>}`. The directory passes bucket errors through unchanged in kind;
//! only transport failures are reclassified as [`Error::NodeUnavailable`].
use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

pub type Result<T> = std::result::Result<T, Error>;

/// Error enum with all possible variants
#[derive(Debug, Serialize)]
pub enum Error {
    /// empty or malformed key, rejected before any lookup
    InvalidKey { reason: String },
    /// key absent in the owning bucket
    NotFound { key: String },
    /// the owning bucket could not be reached (connection refused, timeout, broken transport)
    NodeUnavailable { addr: String, reason: String },
    /// the durable representation of a bucket could not be parsed at startup
    CorruptState { path: String, reason: String },
    /// the durable rewrite of a bucket failed. The in-memory mutation was rolled back.
    StorageIo { reason: String },
    /// a bucket answered with an error status other than 404. Passed through verbatim by the directory,
    /// `kind` being the `error` field of the bucket's body when it had one.
    Remote {
        status: u16,
        kind: Option<String>,
        reason: String,
    },
    /// a bucket answered successfully but its payload could not be decoded
    InvalidServerResponse { reason: String },
    InvalidServerConfig { reason: String },
    Internal { reason: String },
}

impl Error {
    /// Returns true if this is an instance of a [`Error::NotFound`] variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if this is an instance of a [`Error::NodeUnavailable`] variant
    pub fn is_node_unavailable(&self) -> bool {
        matches!(self, Error::NodeUnavailable { .. })
    }

    /// short, stable name of the variant. Used as the `error` field of error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidKey { .. } => "invalid_key",
            Error::NotFound { .. } => "not_found",
            Error::NodeUnavailable { .. } => "node_unavailable",
            Error::CorruptState { .. } => "corrupt_state",
            Error::StorageIo { .. } => "storage_io",
            Error::Remote { .. } => "remote",
            Error::InvalidServerResponse { .. } => "invalid_server_response",
            Error::InvalidServerConfig { .. } => "invalid_server_config",
            Error::Internal { .. } => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidKey { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::NodeUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Remote { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::InvalidServerResponse { .. } => StatusCode::BAD_GATEWAY,
            Error::CorruptState { .. }
            | Error::StorageIo { .. }
            | Error::InvalidServerConfig { .. }
            | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Error::InvalidKey { reason } => format!("invalid key: {}", reason),
            Error::NotFound { key } => format!("key not found: {}", key),
            Error::NodeUnavailable { addr, reason } => {
                format!("bucket unavailable at {}: {}", addr, reason)
            }
            Error::CorruptState { path, reason } => {
                format!("corrupt bucket file {}: {}", path, reason)
            }
            Error::Remote { reason, .. } => reason.clone(),
            Error::StorageIo { reason }
            | Error::InvalidServerResponse { reason }
            | Error::InvalidServerConfig { reason }
            | Error::Internal { reason } => reason.clone(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

/// The JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let error = match err {
            Error::Remote {
                kind: Some(kind), ..
            } => kind.clone(),
            _ => err.kind().to_string(),
        };

        Self {
            error,
            message: err.message(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            event!(Level::ERROR, "request failed: {}", self);
        }

        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::StorageIo {
            reason: err.to_string(),
        }
    }
}

impl From<crate::storage_engine::Error> for Error {
    fn from(err: crate::storage_engine::Error) -> Self {
        use crate::storage_engine::Error as StorageEngineError;
        match err {
            StorageEngineError::Io { reason } => Self::StorageIo { reason },
            StorageEngineError::CorruptState { path, reason } => Self::CorruptState { path, reason },
            StorageEngineError::Logic { reason } => Self::Internal { reason },
        }
    }
}
