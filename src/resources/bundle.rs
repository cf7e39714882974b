//! resources::bundle
//!
//! Bundle resource representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed `type` of every bundle.
pub const BUNDLE_TYPE: &str = "bundle";

/// An ordered collection of full object payloads.
///
/// Object order is the order of the entries the bundle was assembled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "type")]
    pub bundle_type: String,
    pub id: String,
    #[serde(default)]
    pub objects: Vec<Value>,
}

impl Bundle {
    /// An empty bundle with a fresh `bundle--<uuid>` ID.
    pub fn new() -> Self {
        Self::with_objects(Vec::new())
    }

    /// A bundle with a fresh ID around the given payloads.
    pub fn with_objects(objects: Vec<Value>) -> Self {
        Self {
            bundle_type: BUNDLE_TYPE.to_string(),
            id: format!("{}--{}", BUNDLE_TYPE, uuid::Uuid::new_v4()),
            objects,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}
