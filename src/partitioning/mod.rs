//! Maps keys to the bucket that owns them.
//!
//! The partition map is fixed for the lifetime of a deployment: `bucket_count` buckets numbered `0..bucket_count`.
//! Every key is hashed with 128-bit murmur3 and the hash is reduced modulo `bucket_count`. There is no ring and no
//! virtual nodes, so changing `bucket_count` remaps (almost) every key. Resharding is not supported.
use murmur3::murmur3_x86_128;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{Error, Result};

/// Identifier (and index) of a bucket
pub type BucketId = usize;

/// Every hash produced by [`stable_hash`] lives in [0, 2^128)
pub type HashFunctionReturnType = u128;

/// Hashes the utf8 bytes of a key. Stable across processes and restarts (fixed seed, no per-process randomness).
pub fn stable_hash(key: &[u8]) -> HashFunctionReturnType {
    // reading from an in-memory cursor can't fail
    murmur3_x86_128(&mut Cursor::new(key), 0).expect("murmur3 over an in-memory buffer")
}

/// The result of routing a single key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub bucket_id: BucketId,
    /// lowercase hex of the full 128 bit hash. Returned to callers for diagnostics only.
    pub digest: String,
}

/// Immutable mapping from keys to bucket ids
#[derive(Clone, Copy, Debug)]
pub struct PartitionMap {
    bucket_count: usize,
    hash_fn: fn(&[u8]) -> HashFunctionReturnType,
}

impl PartitionMap {
    /// # Errors
    /// [`Error::InvalidServerConfig`] if `bucket_count` is 0
    pub fn new(bucket_count: usize) -> Result<Self> {
        Self::new_with_hash_fn(bucket_count, stable_hash)
    }

    pub fn new_with_hash_fn(
        bucket_count: usize,
        hash_fn: fn(&[u8]) -> HashFunctionReturnType,
    ) -> Result<Self> {
        if bucket_count == 0 {
            return Err(Error::InvalidServerConfig {
                reason: "bucket_count must be at least 1".to_string(),
            });
        }

        Ok(Self {
            bucket_count,
            hash_fn,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Returns the owner of the given key
    pub fn key_owner(&self, key: &[u8]) -> BucketId {
        self.route(key).bucket_id
    }

    pub fn route(&self, key: &[u8]) -> Route {
        let hash = (self.hash_fn)(key);
        Route {
            bucket_id: (hash % self.bucket_count as HashFunctionReturnType) as BucketId,
            digest: hex::encode(hash.to_be_bytes()),
        }
    }
}
