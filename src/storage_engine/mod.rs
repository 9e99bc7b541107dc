//! This trait represents the interface for a bucket's storage engine (Key/Value)
//!
//! Keys and values are opaque strings and are not interpreted in any way by StorageEngine implementations.
//! Mutations return the previous value so that callers can tell a create from an update and a
//! delete of an existing key from a miss.
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

pub mod in_memory;
pub mod json_file;

#[async_trait]
pub trait StorageEngine: Debug {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Inserts or overrides `key`. Returns the previous value, if any
    async fn put(&self, key: String, value: String) -> Result<Option<String>>;
    /// Removes `key`. Returns the removed value, if any
    async fn delete(&self, key: &str) -> Result<Option<String>>;
    async fn len(&self) -> Result<usize>;
}

#[derive(Debug, Serialize)]
pub enum Error {
    /// durable rewrite failed
    Io { reason: String },
    /// durable representation exists but can't be parsed
    CorruptState { path: String, reason: String },
    Logic { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}
