use serde::{Deserialize, Serialize};

/// The entry that was removed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub key: String,
    pub value: String,
}
