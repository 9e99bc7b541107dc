use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Query params of `PUT /put?key=<k>&value=<v>`.
///
/// Both params default to the empty string: an empty key is rejected by [`super::validate_key`],
/// an empty value is a perfectly valid value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Put {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Put {
    pub fn new(key: String, value: String) -> Self {
        Self { key, value }
    }
}

/// Whether a put inserted a new key or overrode an existing one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    pub key: String,
    pub value: String,
    pub action: Action,
}
