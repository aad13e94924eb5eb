use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::model::{Linkage, ResourceId, ResourceIdentifier, ResourceType};

/// A stored resource as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub id: ResourceId,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Linkage>,
}

impl Model {
    pub fn new(resource_type: ResourceType, id: ResourceId) -> Self {
        Self {
            resource_type,
            id,
            attributes: Map::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(self.resource_type.clone(), self.id.clone())
    }

    /// Render as a JSON:API resource object.
    pub fn to_resource_object(&self) -> Value {
        let relationships: Map<String, Value> = self
            .relationships
            .iter()
            .map(|(name, linkage)| (name.clone(), json!({ "data": linkage })))
            .collect();

        let mut object = json!({
            "type": self.resource_type,
            "id": self.id,
        });
        if !self.attributes.is_empty() {
            object["attributes"] = Value::Object(self.attributes.clone());
        }
        if !relationships.is_empty() {
            object["relationships"] = Value::Object(relationships);
        }
        object
    }
}
