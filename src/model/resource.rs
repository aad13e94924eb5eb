use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::model::{Linkage, ResourceId, ResourceType};

/// A relationship member of a resource object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipObject {
    pub data: Linkage,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

/// The primary data of a create or update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipObject>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ResourceObject {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            id: None,
            lid: None,
            attributes: Map::new(),
            relationships: BTreeMap::new(),
            meta: Map::new(),
        }
    }

    /// Attributes and relationship linkage flattened into one field map.
    ///
    /// This is the payload a resource is considered to carry when no
    /// validator has produced a canonical one.
    pub fn all(&self) -> Map<String, Value> {
        let mut fields = self.attributes.clone();
        for (name, relationship) in &self.relationships {
            fields.insert(
                name.clone(),
                serde_json::to_value(&relationship.data).unwrap_or(Value::Null),
            );
        }
        fields
    }

    pub fn is_relationship(&self, field: &str) -> bool {
        self.relationships.contains_key(field)
    }
}
