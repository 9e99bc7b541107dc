//! Mock implementation for [`Client`]
//!
//! Runs a [`Bucket`] in-process so that directory logic can be tested without sockets, with
//! per-operation faults and call counters.
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use super::Client;
use crate::{
    bucket::Bucket,
    cmd::{
        delete::DeleteResponse, get::GetResponse, health::BucketHealth, put::PutResponse,
    },
    error::Result,
    test_utils::fault::{Fault, Kind},
};

#[derive(Debug, Default)]
pub struct Stats {
    n_calls: AtomicUsize,
}

impl Stats {
    pub fn n_calls(&self) -> usize {
        self.n_calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.n_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MockClientStats {
    pub put: Stats,
    pub get: Stats,
    pub delete: Stats,
    pub health: Stats,
}

#[derive(Debug, Clone, Default)]
pub struct MockClientFaults {
    pub put: Fault,
    pub get: Fault,
    pub delete: Fault,
    pub health: Fault,
}

#[derive(Debug)]
pub struct MockClient {
    addr: String,
    pub faults: MockClientFaults,
    pub stats: MockClientStats,
    pub bucket: Arc<Bucket>,
}

impl MockClient {
    pub fn new(faults: MockClientFaults, bucket: Arc<Bucket>) -> Self {
        Self {
            addr: format!("mock://bucket-{}", bucket.id()),
            faults,
            stats: Default::default(),
            bucket,
        }
    }
}

#[async_trait]
impl Client for MockClient {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn put(&self, key: &str, value: &str) -> Result<PutResponse> {
        self.stats.put.record();
        self.faults.put.check(&self.addr)?;
        self.bucket.put(key.to_string(), value.to_string()).await
    }

    async fn get(&self, key: &str) -> Result<GetResponse> {
        self.stats.get.record();
        self.faults.get.check(&self.addr)?;
        self.bucket.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<DeleteResponse> {
        self.stats.delete.record();
        self.faults.delete.check(&self.addr)?;
        self.bucket.delete(key).await
    }

    async fn health(&self) -> Result<BucketHealth> {
        self.stats.health.record();
        self.faults.health.check(&self.addr)?;
        self.bucket.health().await
    }
}

#[derive(Default)]
pub struct MockClientBuilder {
    faults: MockClientFaults,
}

impl MockClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails as if the node was down
    pub fn unavailable(mut self) -> Self {
        let fault = Fault::always(Kind::Unavailable);
        self.faults = MockClientFaults {
            put: fault.clone(),
            get: fault.clone(),
            delete: fault.clone(),
            health: fault,
        };
        self
    }

    pub fn with_put_fault(mut self, fault: Fault) -> Self {
        self.faults.put = fault;
        self
    }

    pub fn with_get_fault(mut self, fault: Fault) -> Self {
        self.faults.get = fault;
        self
    }

    pub fn build(self, bucket: Arc<Bucket>) -> MockClient {
        MockClient::new(self.faults, bucket)
    }
}
