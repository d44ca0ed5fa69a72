use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the node table, snapshotted at sync time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub k: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub val: String,
    #[serde(rename = "ref")]
    pub refs: u64,
    pub v: RecordDoc,
}

/// The `v` JSON document: the node with its children replaced by identities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordDoc {
    pub gid: String,
    #[serde(rename = "ref")]
    pub refs: u64,
    #[serde(rename = "type")]
    pub ty: String,
    pub val: String,
    pub slot: BTreeMap<String, String>,
    pub nest: Vec<String>,
}

impl Record {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.v)
    }
}
