use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{ResourceId, ResourceType};

/// A `{type, id|lid}` pointer to a single resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ResourceIdentifier {
    pub fn new(resource_type: ResourceType, id: ResourceId) -> Self {
        Self {
            resource_type,
            id: Some(id),
            lid: None,
            meta: Map::new(),
        }
    }

    pub fn local(resource_type: ResourceType, lid: ResourceId) -> Self {
        Self {
            resource_type,
            id: None,
            lid: Some(lid),
            meta: Map::new(),
        }
    }

    /// Whether this identifier points at the same resource as `other`,
    /// ignoring meta.
    pub fn same_resource(&self, other: &ResourceIdentifier) -> bool {
        self.resource_type == other.resource_type && self.id == other.id && self.lid == other.lid
    }
}

/// Relationship linkage: either a to-one identifier (or null) or a
/// to-many list of identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    // Must be tried before ToOne, which would otherwise accept nothing but null/objects anyway
    ToMany(Vec<ResourceIdentifier>),
    ToOne(Option<ResourceIdentifier>),
}

impl Linkage {
    pub fn is_to_many(&self) -> bool {
        matches!(self, Linkage::ToMany(_))
    }

    pub fn identifiers(&self) -> Vec<&ResourceIdentifier> {
        match self {
            Linkage::ToMany(ids) => ids.iter().collect(),
            Linkage::ToOne(id) => id.iter().collect(),
        }
    }

    pub fn identifiers_mut(&mut self) -> Vec<&mut ResourceIdentifier> {
        match self {
            Linkage::ToMany(ids) => ids.iter_mut().collect(),
            Linkage::ToOne(id) => id.iter_mut().collect(),
        }
    }
}
