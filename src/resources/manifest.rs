//! resources::manifest
//!
//! Manifest resource representation.

use serde::{Deserialize, Serialize};

use crate::core::types::{ObjectId, Timestamp};

/// One manifest line: which version of which object, added when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: ObjectId,
    pub date_added: Timestamp,
    pub version: Timestamp,
    pub spec_version: String,
}

/// A page of manifest entries, ordered by added time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub objects: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl From<Vec<ManifestEntry>> for Manifest {
    fn from(objects: Vec<ManifestEntry>) -> Self {
        Self { objects }
    }
}
