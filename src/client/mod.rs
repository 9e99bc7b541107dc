//! Module that contains the Client API used to talk to bucketdb nodes.
//!
//! The directory uses a [`Client`] per bucket to forward operations. [`http::HttpClient`] is the real
//! implementation; [`mock::MockClient`] runs a [`crate::bucket::Bucket`] in-process and can inject faults.
use crate::{
    cmd::{
        delete::DeleteResponse, get::GetResponse, health::BucketHealth, put::PutResponse,
    },
    error::Result,
};

use async_trait::async_trait;
use std::fmt::Debug;

pub mod http;
pub mod mock;

/// Trait that defines which functions a bucket client needs to implement
#[async_trait]
pub trait Client: Debug {
    /// Address of the node this client talks to. Used in errors and logs.
    fn addr(&self) -> &str;
    /// Put command interface
    async fn put(&self, key: &str, value: &str) -> Result<PutResponse>;
    /// Get command interface
    async fn get(&self, key: &str) -> Result<GetResponse>;
    /// Delete command interface
    async fn delete(&self, key: &str) -> Result<DeleteResponse>;
    /// Health command interface
    async fn health(&self) -> Result<BucketHealth>;
}
