use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    partitioning::BucketId,
};

pub const BUCKET_ID_PLACEHOLDER: &str = "{bucket_id}";
const DEFAULT_BUCKET_ADDR_TEMPLATE: &str = "http://bucket-{bucket_id}.bucket:8000";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(flatten)]
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Bucket(BucketConfig),
    Directory(DirectoryConfig),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BucketConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// explicit identity of the bucket. Also the partition index it owns.
    pub bucket_id: BucketId,
    /// the bucket file is `<data_dir>/bucket_<bucket_id>.json`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub storage_engine: StorageEngine,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageEngine {
    InMemory,
    #[default]
    File,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DirectoryConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bucket_count")]
    pub bucket_count: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// bounds concurrent forwarded calls per bucket. Unbounded if absent.
    #[serde(default)]
    pub max_in_flight_per_bucket: Option<usize>,
    #[serde(default)]
    pub buckets: BucketAddrs,
}

/// Where the directory finds each bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketAddrs {
    /// `{bucket_id}` is replaced by 0..bucket_count
    Template(String),
    /// one address per bucket, indexed by bucket id
    Static(Vec<String>),
}

impl Default for BucketAddrs {
    fn default() -> Self {
        Self::Template(DEFAULT_BUCKET_ADDR_TEMPLATE.to_string())
    }
}

impl BucketAddrs {
    /// Resolves the address of every bucket, in bucket id order
    ///
    /// # Errors
    /// [`Error::InvalidServerConfig`] if the template has no placeholder or the static list doesn't have
    /// exactly `bucket_count` entries
    pub fn resolve(&self, bucket_count: usize) -> Result<Vec<String>> {
        match self {
            BucketAddrs::Template(template) => {
                if !template.contains(BUCKET_ID_PLACEHOLDER) {
                    return Err(Error::InvalidServerConfig {
                        reason: format!(
                            "bucket address template {} must contain {}",
                            template, BUCKET_ID_PLACEHOLDER
                        ),
                    });
                }

                Ok((0..bucket_count)
                    .map(|bucket_id| {
                        template.replace(BUCKET_ID_PLACEHOLDER, &bucket_id.to_string())
                    })
                    .collect())
            }
            BucketAddrs::Static(addrs) => {
                if addrs.len() != bucket_count {
                    return Err(Error::InvalidServerConfig {
                        reason: format!(
                            "expected {} bucket addresses, got {}",
                            bucket_count,
                            addrs.len()
                        ),
                    });
                }

                Ok(addrs.clone())
            }
        }
    }
}

/// Values that can be overridden from the command line / environment, applied on top of the config file
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bucket_id: Option<BucketId>,
    pub data_dir: Option<PathBuf>,
    pub bucket_count: Option<usize>,
}

impl Config {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::InvalidServerConfig {
                reason: format!("unable to read {}: {}", path.display(), e),
            })?;
        serde_json::from_str(&content).map_err(|e| Error::InvalidServerConfig {
            reason: format!("unable to parse {}: {}", path.display(), e),
        })
    }

    /// A bucket config with every default applied
    pub fn bucket(bucket_id: BucketId) -> Self {
        Self {
            role: Role::Bucket(BucketConfig {
                host: default_host(),
                port: default_port(),
                bucket_id,
                data_dir: default_data_dir(),
                storage_engine: StorageEngine::default(),
            }),
        }
    }

    /// A directory config with every default applied
    pub fn directory() -> Self {
        Self {
            role: Role::Directory(DirectoryConfig {
                host: default_host(),
                port: default_port(),
                bucket_count: default_bucket_count(),
                request_timeout_ms: default_request_timeout_ms(),
                connect_timeout_ms: default_connect_timeout_ms(),
                max_in_flight_per_bucket: None,
                buckets: BucketAddrs::default(),
            }),
        }
    }

    /// Overrides that don't apply to the configured role are ignored
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        match &mut self.role {
            Role::Bucket(config) => {
                if let Some(port) = overrides.port {
                    config.port = port;
                }
                if let Some(bucket_id) = overrides.bucket_id {
                    config.bucket_id = bucket_id;
                }
                if let Some(data_dir) = overrides.data_dir {
                    config.data_dir = data_dir;
                }
            }
            Role::Directory(config) => {
                if let Some(port) = overrides.port {
                    config.port = port;
                }
                if let Some(bucket_count) = overrides.bucket_count {
                    config.bucket_count = bucket_count;
                }
            }
        }

        self
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_bucket_count() -> usize {
    2
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    1_000
}
