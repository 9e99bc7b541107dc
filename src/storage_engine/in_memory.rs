//! An in-memory [`StorageEngine`] implementation
//!
//! This implementation uses a [`HashMap`] wrapped by a [`Mutex`] and does nothing fancy around performance.
//! Nothing survives a restart, so it is only meant for development/testing (`"storage_engine": "in_memory"`).
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::instrument;

use super::{Error, Result, StorageEngine};

/// Type alias for the underlying datastructure used to store the key/value pairs
type Store = HashMap<String, String>;

/// The InMemory [`StorageEngine`] definition
#[derive(Clone, Debug, Default)]
pub struct InMemory {
    inner: Arc<Mutex<Store>>,
}

impl InMemory {
    /// private function used to acquire a lock over the [`Store`].
    /// A fail to acquire a lock is considered a [`Error::Logic`] since the only reason why
    /// an [`Error`] should be returned is in case of [`Mutex`] poisoning
    fn acquire_lock(&self) -> Result<MutexGuard<Store>> {
        match self.inner.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => Err(Error::Logic {
                reason: "Unable to acquire lock for InMemory storage engine - poisoned..."
                    .to_string(),
            }),
        }
    }
}

#[async_trait]
impl StorageEngine for InMemory {
    #[instrument(name = "storage_engine::in_memory::get", level = "debug", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.acquire_lock()?;
        Ok(guard.get(key).cloned())
    }

    #[instrument(
        name = "storage_engine::in_memory::put",
        level = "debug",
        skip(self, value)
    )]
    async fn put(&self, key: String, value: String) -> Result<Option<String>> {
        let mut guard = self.acquire_lock()?;
        Ok(guard.insert(key, value))
    }

    #[instrument(name = "storage_engine::in_memory::delete", level = "debug", skip(self))]
    async fn delete(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.acquire_lock()?;
        Ok(guard.remove(key))
    }

    async fn len(&self) -> Result<usize> {
        let guard = self.acquire_lock()?;
        Ok(guard.len())
    }
}
