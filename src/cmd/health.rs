use serde::{Deserialize, Serialize};

use crate::partitioning::BucketId;

/// Operational view of a single bucket. Never used for routing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketHealth {
    pub bucket_id: BucketId,
    pub keys_len: usize,
}

/// Liveness of the directory. Does not depend on any bucket being reachable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryHealth {
    pub bucket_count: usize,
}
