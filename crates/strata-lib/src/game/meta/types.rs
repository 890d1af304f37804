//! Wire documents served by the component metadata service.

use crate::game::profile::Reference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level catalog document (`index.json`): the known component UIDs.
/// Each entry implies a version-list file named `<uid>.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDocument {
    #[serde(default)]
    pub index: Vec<IndexEntryDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntryDocument {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Version-list document (`<uid>.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionListDocument {
    pub uid: Option<String>,
    pub name: Option<String>,
    pub versions: Vec<VersionRecordDocument>,
}

/// One version record inside a version-list document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionRecordDocument {
    pub uid: Option<String>,
    pub version: String,
    #[serde(rename = "type")]
    pub release_type: Option<String>,
    pub release_time: Option<DateTime<Utc>>,
    pub requires: Vec<Reference>,
}
