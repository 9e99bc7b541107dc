//! A durable [`StorageEngine`] that mirrors a single JSON file.
//!
//! Every key/value pair lives in memory and in `<data_dir>/bucket_<id>.json`. Each mutation rewrites the whole
//! file before returning (flush-on-write, no batching, no WAL). The rewrite goes to `<file>.tmp`, is fsynced
//! and then renamed over the target, followed by an fsync of the directory. A crash mid-write leaves either
//! the old or the new file, never a truncated one.
//!
//! # Locking
//! The map and the file form a single unit guarded by one [`RwLock`]. Mutations hold the write lock for the
//! in-memory change *and* the rewrite; if the rewrite fails the in-memory change is rolled back before the
//! lock is released. Reads share the read lock, so they never observe memory that disagrees with disk.
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tokio::{io::AsyncWriteExt, sync::RwLock};
use tracing::{event, instrument, Level};

use super::{Error, Result, StorageEngine};
use crate::partitioning::BucketId;

/// BTreeMap so that the file on disk is sorted and diffable
type Store = BTreeMap<String, String>;

#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
    tmp_path: PathBuf,
    inner: RwLock<Store>,
}

/// Path of the durable representation of a given bucket
pub fn bucket_file_path(data_dir: &Path, bucket_id: BucketId) -> PathBuf {
    data_dir.join(format!("bucket_{}.json", bucket_id))
}

impl JsonFile {
    /// Loads the durable representation of `bucket_id` from `data_dir`, creating `data_dir` if needed.
    ///
    /// # Errors
    ///  1. [`Error::CorruptState`] if the file exists but isn't a JSON object of strings
    ///  2. [`Error::Io`] if the directory can't be created or the file can't be read
    #[instrument(level = "info")]
    pub async fn open(data_dir: &Path, bucket_id: BucketId) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let path = bucket_file_path(data_dir, bucket_id);
        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".tmp");

        let store = match tokio::fs::read(&path).await {
            Ok(content) => {
                let store: Store =
                    serde_json::from_slice(&content).map_err(|e| Error::CorruptState {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                event!(
                    Level::INFO,
                    "Loaded {} keys from {}",
                    store.len(),
                    path.display()
                );
                store
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                event!(
                    Level::INFO,
                    "No existing data file at {}, starting empty",
                    path.display()
                );
                Store::default()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            tmp_path: tmp_path.into(),
            inner: RwLock::new(store),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the full store to the temporary file and renames it over the target.
    /// On failure the temporary file is removed and the target is left as it was.
    async fn persist(&self, store: &Store) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(store).map_err(|e| Error::Logic {
            reason: format!("unable to serialize bucket store: {}", e),
        })?;

        if let Err(err) = self.replace(&serialized).await {
            if let Err(cleanup_err) = tokio::fs::remove_file(&self.tmp_path).await {
                if cleanup_err.kind() != std::io::ErrorKind::NotFound {
                    event!(
                        Level::WARN,
                        "Unable to remove {}: {}",
                        self.tmp_path.display(),
                        cleanup_err
                    );
                }
            }
            return Err(err);
        }

        Ok(())
    }

    async fn replace(&self, serialized: &[u8]) -> Result<()> {
        let mut file = tokio::fs::File::create(&self.tmp_path).await?;
        file.write_all(serialized).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        self.sync_parent_dir().await
    }

    /// The rename is only durable once the directory entry is
    #[cfg(unix)]
    async fn sync_parent_dir(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        tokio::fs::File::open(parent).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_parent_dir(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StorageEngine for JsonFile {
    #[instrument(name = "storage_engine::json_file::get", level = "debug", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    #[instrument(
        name = "storage_engine::json_file::put",
        level = "debug",
        skip(self, value)
    )]
    async fn put(&self, key: String, value: String) -> Result<Option<String>> {
        let mut guard = self.inner.write().await;
        let previous = guard.insert(key.clone(), value);

        if let Err(err) = self.persist(&guard).await {
            event!(
                Level::ERROR,
                "Durable rewrite of {} failed, rolling back put: {}",
                self.path.display(),
                err
            );
            match previous {
                Some(previous) => guard.insert(key, previous),
                None => guard.remove(&key),
            };
            return Err(err);
        }

        Ok(previous)
    }

    #[instrument(name = "storage_engine::json_file::delete", level = "debug", skip(self))]
    async fn delete(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.inner.write().await;
        let Some(removed) = guard.remove(key) else {
            return Ok(None);
        };

        if let Err(err) = self.persist(&guard).await {
            event!(
                Level::ERROR,
                "Durable rewrite of {} failed, rolling back delete: {}",
                self.path.display(),
                err
            );
            guard.insert(key.to_string(), removed);
            return Err(err);
        }

        Ok(Some(removed))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{bucket_file_path, JsonFile};
    use crate::{
        storage_engine::{Error, StorageEngine},
        utils::scratch_dir,
    };
    use std::{collections::BTreeMap, sync::Arc};

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = scratch_dir();
        let store = JsonFile::open(&dir, 0).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 0);
        assert_eq!(store.path(), bucket_file_path(&dir, 0));
        // nothing is written until the first mutation
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn put_is_written_through() {
        let dir = scratch_dir();
        let store = JsonFile::open(&dir, 3).await.unwrap();

        store
            .put("alice".to_string(), "1".to_string())
            .await
            .unwrap();
        store.put("bob".to_string(), String::new()).await.unwrap();

        let on_disk: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(bucket_file_path(&dir, 3)).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk["alice"], "1");
        assert_eq!(on_disk["bob"], "");
        // the temporary file never outlives a successful rewrite
        assert!(!dir.join("bucket_3.json.tmp").exists());
    }

    #[tokio::test]
    async fn reopen_recovers_state() {
        let dir = scratch_dir();
        {
            let store = JsonFile::open(&dir, 1).await.unwrap();
            store
                .put("alice".to_string(), "1".to_string())
                .await
                .unwrap();
            store
                .put("bob".to_string(), "2".to_string())
                .await
                .unwrap();
            store.delete("bob").await.unwrap();
        }

        let store = JsonFile::open(&dir, 1).await.unwrap();
        assert_eq!(store.get("alice").await.unwrap().unwrap(), "1");
        assert!(store.get("bob").await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn buckets_do_not_share_files() {
        let dir = scratch_dir();
        let bucket_0 = JsonFile::open(&dir, 0).await.unwrap();
        let bucket_1 = JsonFile::open(&dir, 1).await.unwrap();

        bucket_0
            .put("alice".to_string(), "1".to_string())
            .await
            .unwrap();

        assert!(bucket_1.get("alice").await.unwrap().is_none());
        let reopened = JsonFile::open(&dir, 1).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_file_is_fatal() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(bucket_file_path(&dir, 0), b"{\"alice\": ").unwrap();

        let err = JsonFile::open(&dir, 0).await.err().unwrap();
        assert!(matches!(err, Error::CorruptState { .. }), "{}", err);
    }

    #[tokio::test]
    async fn non_string_values_are_corrupt() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(bucket_file_path(&dir, 0), b"{\"alice\": 1}").unwrap();

        let err = JsonFile::open(&dir, 0).await.err().unwrap();
        assert!(matches!(err, Error::CorruptState { .. }), "{}", err);
    }

    #[tokio::test]
    async fn failed_rewrite_rolls_back_put() {
        let dir = scratch_dir();
        let store = JsonFile::open(&dir, 0).await.unwrap();
        store
            .put("alice".to_string(), "1".to_string())
            .await
            .unwrap();

        // removing the directory makes every subsequent rewrite fail
        std::fs::remove_dir_all(&dir).unwrap();

        let err = store
            .put("alice".to_string(), "2".to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Io { .. }), "{}", err);
        assert_eq!(store.get("alice").await.unwrap().unwrap(), "1");

        let err = store
            .put("bob".to_string(), "2".to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Io { .. }), "{}", err);
        assert!(store.get("bob").await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_rewrite_rolls_back_delete() {
        let dir = scratch_dir();
        let store = JsonFile::open(&dir, 0).await.unwrap();
        store
            .put("alice".to_string(), "1".to_string())
            .await
            .unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let err = store.delete("alice").await.err().unwrap();
        assert!(matches!(err, Error::Io { .. }), "{}", err);
        assert_eq!(store.get("alice").await.unwrap().unwrap(), "1");
    }

    #[tokio::test]
    async fn failed_rename_removes_tmp_file() {
        let dir = scratch_dir();
        let store = JsonFile::open(&dir, 0).await.unwrap();

        // a directory in place of the bucket file lets the tmp write succeed and the rename fail
        std::fs::create_dir_all(store.path()).unwrap();

        let err = store
            .put("alice".to_string(), "1".to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Io { .. }), "{}", err);
        assert!(store.get("alice").await.unwrap().is_none());
        assert!(!dir.join("bucket_0.json.tmp").exists());
        assert!(store.path().is_dir());
    }

    // two writers racing on the same key must leave exactly one of the submitted values, in memory and on disk
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_same_key() {
        let dir = scratch_dir();
        let store = Arc::new(JsonFile::open(&dir, 0).await.unwrap());
        let value_a = "a".repeat(4096);
        let value_b = "b".repeat(4096);

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let value = if i % 2 == 0 {
                value_a.clone()
            } else {
                value_b.clone()
            };
            handles.push(tokio::spawn(async move {
                store.put("key".to_string(), value).await.unwrap();
            }));
        }
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        let in_memory = store.get("key").await.unwrap().unwrap();
        assert!(in_memory == value_a || in_memory == value_b);

        let on_disk: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["key"], in_memory);
    }
}
