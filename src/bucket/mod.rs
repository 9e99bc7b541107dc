//! A bucket owns exactly one partition of the keyspace.
//!
//! It answers single-key operations from the in-memory mirror held by its [`StorageEngine`] and relies on the
//! engine to keep the durable representation in sync (see [`crate::storage_engine::json_file`]).
//!
//! A bucket goes through two states: [`State::Loading`] while the engine reads the durable representation and
//! [`State::Ready`] once it can serve. [`Bucket::open`] only returns a ready bucket; a corrupt file fails the
//! open instead of producing an empty partition.
use std::{path::Path, sync::Arc};
use tracing::{event, instrument, Level};

use crate::{
    cmd::{
        delete::DeleteResponse,
        get::GetResponse,
        health::BucketHealth,
        put::{Action, PutResponse},
        validate_key,
    },
    error::{Error, Result},
    partitioning::BucketId,
    server::config::StorageEngine as StorageEngineKind,
    storage_engine::{in_memory::InMemory, json_file::JsonFile, StorageEngine as StorageEngineTrait},
};

pub mod handlers;

/// type alias to the [`StorageEngineTrait`] that makes it clonable and [`Send`]
pub type StorageEngine = Arc<dyn StorageEngineTrait + Send + Sync + 'static>;

/// Lifecycle of a bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Loading,
    Ready,
}

#[derive(Debug)]
pub struct Bucket {
    id: BucketId,
    storage: StorageEngine,
}

impl Bucket {
    /// Wraps an already loaded [`StorageEngine`]
    pub fn new(id: BucketId, storage: StorageEngine) -> Self {
        Self { id, storage }
    }

    /// Loads the partition owned by `id` and returns a [`State::Ready`] bucket.
    ///
    /// # Errors
    /// [`Error::CorruptState`] if the durable representation can't be parsed,
    /// [`Error::StorageIo`] if it can't be read
    #[instrument(level = "info", skip(data_dir))]
    pub async fn open(id: BucketId, engine: StorageEngineKind, data_dir: &Path) -> Result<Self> {
        event!(Level::INFO, "Bucket {} state: {:?}", id, State::Loading);
        let storage: StorageEngine = match engine {
            StorageEngineKind::InMemory => Arc::new(InMemory::default()),
            StorageEngineKind::File => Arc::new(JsonFile::open(data_dir, id).await?),
        };

        let bucket = Self::new(id, storage);
        event!(
            Level::INFO,
            "Bucket {} state: {:?} ({} keys)",
            id,
            State::Ready,
            bucket.storage.len().await?
        );
        Ok(bucket)
    }

    pub fn id(&self) -> BucketId {
        self.id
    }

    /// Inserts or overrides `key`. The returned [`Action`] tells whether the key existed before.
    #[instrument(name = "bucket::put", level = "info", skip(self, value), fields(bucket_id = self.id))]
    pub async fn put(&self, key: String, value: String) -> Result<PutResponse> {
        validate_key(&key)?;
        let previous = self.storage.put(key.clone(), value.clone()).await?;
        let action = match previous {
            Some(_) => Action::Updated,
            None => Action::Created,
        };
        event!(Level::INFO, "{} key", action);

        Ok(PutResponse { key, value, action })
    }

    #[instrument(name = "bucket::get", level = "debug", skip(self), fields(bucket_id = self.id))]
    pub async fn get(&self, key: &str) -> Result<GetResponse> {
        validate_key(key)?;
        match self.storage.get(key).await? {
            Some(value) => Ok(GetResponse { value }),
            None => {
                event!(Level::DEBUG, "key not found");
                Err(Error::NotFound {
                    key: key.to_string(),
                })
            }
        }
    }

    /// Removes `key` and returns the removed entry
    #[instrument(name = "bucket::delete", level = "info", skip(self), fields(bucket_id = self.id))]
    pub async fn delete(&self, key: &str) -> Result<DeleteResponse> {
        validate_key(key)?;
        match self.storage.delete(key).await? {
            Some(value) => {
                event!(Level::INFO, "deleted key");
                Ok(DeleteResponse {
                    key: key.to_string(),
                    value,
                })
            }
            None => {
                event!(Level::DEBUG, "key not found");
                Err(Error::NotFound {
                    key: key.to_string(),
                })
            }
        }
    }

    pub async fn health(&self) -> Result<BucketHealth> {
        Ok(BucketHealth {
            bucket_id: self.id,
            keys_len: self.storage.len().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Bucket;
    use crate::{
        cmd::put::Action, error::Error, server::config::StorageEngine,
        storage_engine::json_file::bucket_file_path, utils::scratch_dir,
    };
    use std::sync::Arc;

    async fn in_memory_bucket(id: usize) -> Bucket {
        Bucket::open(id, StorageEngine::InMemory, &scratch_dir())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn put_classifies_created_then_updated() {
        let bucket = in_memory_bucket(0).await;

        let first = bucket
            .put("alice".to_string(), "1".to_string())
            .await
            .unwrap();
        assert_eq!(first.action, Action::Created);

        let second = bucket
            .put("alice".to_string(), "2".to_string())
            .await
            .unwrap();
        assert_eq!(second.action, Action::Updated);
        assert_eq!(second.value, "2");

        assert_eq!(bucket.get("alice").await.unwrap().value, "2");
    }

    #[tokio::test]
    async fn empty_value_round_trips() {
        let bucket = in_memory_bucket(0).await;
        bucket.put("alice".to_string(), String::new()).await.unwrap();
        assert_eq!(bucket.get("alice").await.unwrap().value, "");
    }

    #[tokio::test]
    async fn empty_key_rejected() {
        let bucket = in_memory_bucket(0).await;
        for err in [
            bucket
                .put(String::new(), "1".to_string())
                .await
                .err()
                .unwrap(),
            bucket.get("").await.err().unwrap(),
            bucket.delete("").await.err().unwrap(),
        ] {
            assert!(matches!(err, Error::InvalidKey { .. }), "{}", err);
        }
        assert_eq!(bucket.health().await.unwrap().keys_len, 0);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let bucket = in_memory_bucket(0).await;
        bucket
            .put("alice".to_string(), "1".to_string())
            .await
            .unwrap();

        let removed = bucket.delete("alice").await.unwrap();
        assert_eq!(removed.key, "alice");
        assert_eq!(removed.value, "1");

        assert!(bucket.get("alice").await.err().unwrap().is_not_found());
        assert!(bucket.delete("alice").await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn health_reports_id_and_len() {
        let bucket = in_memory_bucket(7).await;
        bucket.put("a".to_string(), "1".to_string()).await.unwrap();
        bucket.put("b".to_string(), "1".to_string()).await.unwrap();
        bucket.put("a".to_string(), "2".to_string()).await.unwrap();

        let health = bucket.health().await.unwrap();
        assert_eq!(health.bucket_id, 7);
        assert_eq!(health.keys_len, 2);
    }

    #[tokio::test]
    async fn file_bucket_survives_restart() {
        let dir = scratch_dir();
        {
            let bucket = Bucket::open(1, StorageEngine::File, &dir).await.unwrap();
            bucket
                .put("alice".to_string(), "1".to_string())
                .await
                .unwrap();
        }

        let bucket = Bucket::open(1, StorageEngine::File, &dir).await.unwrap();
        assert_eq!(bucket.get("alice").await.unwrap().value, "1");
        assert_eq!(bucket.health().await.unwrap().keys_len, 1);
    }

    #[tokio::test]
    async fn corrupt_file_prevents_ready() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(bucket_file_path(&dir, 0), b"not json").unwrap();

        let err = Bucket::open(0, StorageEngine::File, &dir).await.err().unwrap();
        assert!(matches!(err, Error::CorruptState { .. }), "{}", err);
        // the corrupt file is left untouched for an operator to inspect
        assert_eq!(
            std::fs::read(bucket_file_path(&dir, 0)).unwrap(),
            b"not json"
        );
    }

    #[tokio::test]
    async fn failed_rewrite_surfaces_storage_io() {
        let dir = scratch_dir();
        let bucket = Bucket::open(0, StorageEngine::File, &dir).await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let err = bucket
            .put("alice".to_string(), "1".to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::StorageIo { .. }), "{}", err);
        assert!(bucket.get("alice").await.err().unwrap().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writers_never_tear() {
        let bucket = Arc::new(in_memory_bucket(0).await);
        let first = {
            let bucket = bucket.clone();
            tokio::spawn(async move { bucket.put("k".to_string(), "x".repeat(1024)).await })
        };
        let second = {
            let bucket = bucket.clone();
            tokio::spawn(async move { bucket.put("k".to_string(), "y".repeat(1024)).await })
        };

        let (first, second) = tokio::join!(first, second);
        let actions = [first.unwrap().unwrap().action, second.unwrap().unwrap().action];
        assert!(actions.contains(&Action::Created));
        assert!(actions.contains(&Action::Updated));

        let value = bucket.get("k").await.unwrap().value;
        assert!(value == "x".repeat(1024) || value == "y".repeat(1024));
    }

    #[quickcheck_async::tokio]
    async fn put_get_round_trip(key: String, value: String) {
        if key.is_empty() {
            return;
        }

        let bucket = in_memory_bucket(0).await;
        bucket.put(key.clone(), value.clone()).await.unwrap();
        assert_eq!(bucket.get(&key).await.unwrap().value, value);
    }
}
