//! Request parameters and response payloads shared by both tiers.
//!
//! # Design principles
//! Commands have 2 responsibilities:
//!  1. Describe request params (query strings / path segments) and validate them
//!  2. Describe the JSON responses sent back to callers
//!
//! Everything else is delegated to [`crate::bucket::Bucket`] (storage) and [`crate::directory::Directory`] (routing).
//! The bucket returns the bare responses; the directory wraps them in [`Routed`].
pub mod delete;
pub mod get;
pub mod health;
pub mod put;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    partitioning::{BucketId, Route},
};

/// Keys must be non-empty. No other restriction is imposed.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(empty_key());
    }

    Ok(())
}

pub fn empty_key() -> Error {
    Error::InvalidKey {
        reason: "key must not be empty".to_string(),
    }
}

/// A bucket response decorated with the routing decision that produced it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routed<T> {
    #[serde(flatten)]
    pub response: T,
    pub bucket_id: BucketId,
    pub digest: String,
}

impl<T> Routed<T> {
    pub fn new(response: T, route: Route) -> Self {
        Self {
            response,
            bucket_id: route.bucket_id,
            digest: route.digest,
        }
    }
}
