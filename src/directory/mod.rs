//! The directory is the stateless routing tier in front of the buckets.
//!
//! For every client operation it
//!  1. validates the key
//!  2. computes the owning bucket with the [`PartitionMap`]
//!  3. forwards the operation to that bucket through its [`Client`] (one call, no retry, no fallback)
//!  4. decorates the bucket response with the routing decision ([`Routed`])
//!
//! Bucket errors are passed through unchanged in kind. Transport failures were already classified as
//! [`Error::NodeUnavailable`] by the client and are never turned into [`Error::NotFound`].
use std::{sync::Arc, time::Duration};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{event, instrument, Level};

use crate::{
    client::{
        http::{connection_pool, HttpClient},
        Client,
    },
    cmd::{
        delete::DeleteResponse, get::GetResponse, health::DirectoryHealth, put::PutResponse,
        validate_key, Routed,
    },
    error::{Error, Result},
    partitioning::{PartitionMap, Route},
    server::config::DirectoryConfig,
};

pub mod handlers;

/// type alias to the [`Client`] trait object that makes it shareable and [`Send`]
pub type SyncClient = Arc<dyn Client + Send + Sync + 'static>;

#[derive(Debug)]
struct BucketHandle {
    client: SyncClient,
    in_flight: Option<Semaphore>,
}

impl BucketHandle {
    async fn acquire(&self) -> Result<Option<SemaphorePermit<'_>>> {
        match &self.in_flight {
            Some(semaphore) => semaphore.acquire().await.map(Some).map_err(|e| Error::Internal {
                reason: format!("in-flight limiter closed: {}", e),
            }),
            None => Ok(None),
        }
    }
}

#[derive(Debug)]
pub struct Directory {
    partition_map: PartitionMap,
    /// indexed by bucket id
    buckets: Vec<BucketHandle>,
}

impl Directory {
    /// # Errors
    /// [`Error::InvalidServerConfig`] if there isn't exactly one client per bucket or if
    /// `max_in_flight_per_bucket` is 0
    pub fn new(
        partition_map: PartitionMap,
        clients: Vec<SyncClient>,
        max_in_flight_per_bucket: Option<usize>,
    ) -> Result<Self> {
        if clients.len() != partition_map.bucket_count() {
            return Err(Error::InvalidServerConfig {
                reason: format!(
                    "expected {} bucket clients, got {}",
                    partition_map.bucket_count(),
                    clients.len()
                ),
            });
        }
        if max_in_flight_per_bucket == Some(0) {
            return Err(Error::InvalidServerConfig {
                reason: "max_in_flight_per_bucket must be at least 1".to_string(),
            });
        }

        let buckets = clients
            .into_iter()
            .map(|client| BucketHandle {
                client,
                in_flight: max_in_flight_per_bucket.map(Semaphore::new),
            })
            .collect();

        Ok(Self {
            partition_map,
            buckets,
        })
    }

    /// Builds the shared connection pool and one [`HttpClient`] per configured bucket
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        let partition_map = PartitionMap::new(config.bucket_count)?;
        let pool = connection_pool(
            Duration::from_millis(config.request_timeout_ms),
            Duration::from_millis(config.connect_timeout_ms),
        )?;

        let clients = config
            .buckets
            .resolve(config.bucket_count)?
            .iter()
            .map(|addr| -> Result<SyncClient> { Ok(Arc::new(HttpClient::new(addr, pool.clone())?)) })
            .collect::<Result<Vec<_>>>()?;

        event!(
            Level::INFO,
            "Directory routing over {} buckets: {:?}",
            config.bucket_count,
            clients.iter().map(|c| c.addr()).collect::<Vec<_>>()
        );

        Self::new(partition_map, clients, config.max_in_flight_per_bucket)
    }

    pub fn bucket_count(&self) -> usize {
        self.partition_map.bucket_count()
    }

    fn route(&self, key: &str) -> Result<(Route, &BucketHandle)> {
        validate_key(key)?;
        let route = self.partition_map.route(key.as_bytes());
        event!(Level::DEBUG, "key routed to bucket {}", route.bucket_id);
        let bucket = self
            .buckets
            .get(route.bucket_id)
            .ok_or_else(|| Error::Internal {
                reason: format!("no client for bucket {}", route.bucket_id),
            })?;
        Ok((route, bucket))
    }

    #[instrument(name = "directory::put", level = "info", skip(self, value))]
    pub async fn put(&self, key: &str, value: &str) -> Result<Routed<PutResponse>> {
        let (route, bucket) = self.route(key)?;
        let _permit = bucket.acquire().await?;
        let response = bucket
            .client
            .put(key, value)
            .await
            .map_err(|e| forward_failed(&route, e))?;

        Ok(Routed::new(response, route))
    }

    #[instrument(name = "directory::get", level = "info", skip(self))]
    pub async fn get(&self, key: &str) -> Result<Routed<GetResponse>> {
        let (route, bucket) = self.route(key)?;
        let _permit = bucket.acquire().await?;
        let response = bucket
            .client
            .get(key)
            .await
            .map_err(|e| forward_failed(&route, e))?;

        Ok(Routed::new(response, route))
    }

    #[instrument(name = "directory::delete", level = "info", skip(self))]
    pub async fn delete(&self, key: &str) -> Result<Routed<DeleteResponse>> {
        let (route, bucket) = self.route(key)?;
        let _permit = bucket.acquire().await?;
        let response = bucket
            .client
            .delete(key)
            .await
            .map_err(|e| forward_failed(&route, e))?;

        Ok(Routed::new(response, route))
    }

    /// Liveness only: never contacts a bucket
    pub fn health(&self) -> DirectoryHealth {
        DirectoryHealth {
            bucket_count: self.bucket_count(),
        }
    }
}

fn forward_failed(route: &Route, err: Error) -> Error {
    match &err {
        Error::NotFound { .. } => event!(Level::DEBUG, "bucket {}: not found", route.bucket_id),
        Error::NodeUnavailable { .. } => {
            event!(Level::WARN, "bucket {} unavailable: {}", route.bucket_id, err)
        }
        _ => event!(Level::WARN, "bucket {} failed: {}", route.bucket_id, err),
    }
    err
}
