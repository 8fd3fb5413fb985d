use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key addressing one value in the session-wide storage kept by the log
/// service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKey {
    /// Storage region the key lives in, when the log service partitions
    /// storage. `None` addresses the default region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<i64>,
    #[serde(rename = "regionKey")]
    pub region_key: String,
}

impl StorageKey {
    pub fn new(region_key: impl Into<String>) -> Self {
        Self {
            region: None,
            region_key: region_key.into(),
        }
    }
}

/// One stored value together with an optional tag distinguishing multiple
/// writers under the same key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageValue {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// The result of reading one storage key: the key that was read and every
/// value found under it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    #[serde(rename = "readKey")]
    pub read_key: StorageKey,
    pub values: Vec<StorageValue>,
}
