//! Registry collections: a default template plus a named map of entities.
//!
//! Both persisted files share this shape. The static file carries scrubbed
//! entries and no active pointer; the dynamic file carries live coordinates
//! and the currently selected entity.

use crate::entity::EntityRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named collection of entity records.
///
/// The map is ordered so serialization is deterministic: the static file is
/// tracked by git, and the flush path compares whole collections for
/// structural equality to suppress redundant writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegistryCollection {
    /// Default-value record; unset fields on entities are filled from it
    /// during fix-up. Not itself an entity.
    #[serde(default)]
    pub entity_template: EntityRecord,

    #[serde(default)]
    pub entity_map: BTreeMap<String, EntityRecord>,

    /// Id of the currently selected entity. Only meaningful in the dynamic
    /// collection; cleared during fix-up if it no longer resolves.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub active_entity: String,
}

impl RegistryCollection {
    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.entity_map.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entity_map.contains_key(id)
    }

    /// Known entity ids, in map order.
    pub fn ids(&self) -> Vec<String> {
        self.entity_map.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_entity_omitted_when_empty() {
        let collection = RegistryCollection::default();
        let json = serde_json::to_value(&collection).unwrap();
        assert!(!json.as_object().unwrap().contains_key("active_entity"));
    }

    #[test]
    fn test_parse_tolerates_missing_fields() {
        let collection: RegistryCollection =
            serde_json::from_str(r#"{"entity_map": {"a": {"label": "A"}}}"#).unwrap();
        assert!(collection.contains("a"));
        assert_eq!(collection.get("a").unwrap().label, "A");
        assert!(collection.active_entity.is_empty());
    }
}
