//! resources::collection
//!
//! Collection resource representation.

use serde::{Deserialize, Serialize};

use crate::core::types::{CollectionId, Timestamp};

/// A collection of shared intelligence objects.
///
/// `enabled` decides whether the collection is served at all; `hidden` only
/// keeps it out of client enumeration.
///
/// # Example
///
/// ```
/// use taxii_datastore::core::types::CollectionId;
/// use taxii_datastore::resources::Collection;
///
/// let mut c = Collection::new(CollectionId::new("intel").unwrap(), "Intel");
/// c.media_types.push("application/stix+json;version=2.1".into());
///
/// let json = serde_json::to_value(&c).unwrap();
/// assert_eq!(json["canRead"], true);
/// assert_eq!(json["mediaTypes"][0], "application/stix+json;version=2.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: CollectionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub hidden: bool,
    pub can_read: bool,
    pub can_write: bool,
    #[serde(default)]
    pub media_types: Vec<String>,
    /// Set by the catalog when the collection is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<Timestamp>,
}

impl Collection {
    /// A new enabled, visible, read-only collection with no media types.
    pub fn new(id: CollectionId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            enabled: true,
            hidden: false,
            can_read: true,
            can_write: false,
            media_types: Vec::new(),
            date_added: None,
        }
    }
}

/// A list of collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    pub collections: Vec<Collection>,
}

impl Collections {
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Find a collection by ID.
    pub fn get(&self, id: &CollectionId) -> Option<&Collection> {
        self.collections.iter().find(|c| &c.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Collection> {
        self.collections.iter()
    }
}

impl From<Vec<Collection>> for Collections {
    fn from(collections: Vec<Collection>) -> Self {
        Self { collections }
    }
}

impl IntoIterator for Collections {
    type Item = Collection;
    type IntoIter = std::vec::IntoIter<Collection>;

    fn into_iter(self) -> Self::IntoIter {
        self.collections.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let mut c = Collection::new(CollectionId::new("c1").unwrap(), "One");
        c.date_added = Some(Timestamp::parse("2020-01-01T00:00:00Z").unwrap());
        let json = serde_json::to_value(&c).unwrap();

        assert_eq!(json["id"], "c1");
        assert_eq!(json["canWrite"], false);
        assert_eq!(json["dateAdded"], "2020-01-01T00:00:00.000000Z");
        assert!(json.get("can_read").is_none());
    }

    #[test]
    fn date_added_omitted_when_unset() {
        let c = Collection::new(CollectionId::new("c1").unwrap(), "One");
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("dateAdded").is_none());
    }

    #[test]
    fn deserializes_with_defaults() {
        let c: Collection = serde_json::from_str(
            r#"{"id":"c1","title":"One","enabled":true,"hidden":true,"canRead":true,"canWrite":true}"#,
        )
        .unwrap();
        assert!(c.hidden);
        assert!(c.media_types.is_empty());
        assert!(c.description.is_empty());
    }

    #[test]
    fn lookup_by_id() {
        let list = Collections::from(vec![
            Collection::new(CollectionId::new("a").unwrap(), "A"),
            Collection::new(CollectionId::new("b").unwrap(), "B"),
        ]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(&CollectionId::new("b").unwrap()).unwrap().title, "B");
        assert!(list.get(&CollectionId::new("z").unwrap()).is_none());
    }
}
