//! Resource schema metadata: which resource types exist, how they appear in
//! URLs, what their ids look like and which fields they have.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::model::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl DataType {
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::String, Value::String(_)) => true,
            (DataType::Number, Value::Number(_)) => true,
            (DataType::Boolean, Value::Bool(_)) => true,
            (DataType::Object, Value::Object(_)) => true,
            (DataType::Array, Value::Array(_)) => true,
            _ => false,
        }
    }
}

/// The shape a resource id must have to be routable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdPattern {
    #[default]
    Any,
    Numeric,
    Uuid,
}

impl IdPattern {
    pub fn matches(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match self {
            IdPattern::Any => true,
            IdPattern::Numeric => value.chars().all(|c| c.is_ascii_digit()),
            IdPattern::Uuid => Uuid::parse_str(value).is_ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Field name used in resource objects and refs.
    pub name: String,
    /// Name used in relationship URLs; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_name: Option<String>,
    pub inverse: ResourceType,
    pub cardinality: Cardinality,
}

impl RelationDef {
    pub fn uri_name(&self) -> &str {
        self.uri_name.as_deref().unwrap_or(&self.name)
    }

    pub fn to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Collection segment used in URLs; defaults to the resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_type: Option<String>,
    #[serde(default)]
    pub id: IdPattern,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub relationships: Vec<RelationDef>,
}

impl ResourceSchema {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            uri_type: None,
            id: IdPattern::Any,
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn uri_type(&self) -> &str {
        self.uri_type
            .as_deref()
            .unwrap_or_else(|| self.resource_type.as_str())
    }

    pub fn id_matches(&self, value: &str) -> bool {
        self.id.matches(value)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn relationship_for_uri(&self, uri_name: &str) -> Option<&RelationDef> {
        self.relationships.iter().find(|r| r.uri_name() == uri_name)
    }

    pub fn with_uri_type(mut self, uri_type: impl Into<String>) -> Self {
        self.uri_type = Some(uri_type.into());
        self
    }

    pub fn with_id(mut self, id: IdPattern) -> Self {
        self.id = id;
        self
    }

    pub fn with_attribute(mut self, name: &str, data_type: DataType, required: bool) -> Self {
        self.attributes.push(AttributeDef {
            name: name.to_string(),
            data_type,
            required: Some(required),
        });
        self
    }

    pub fn with_relationship(
        mut self,
        name: &str,
        inverse: ResourceType,
        cardinality: Cardinality,
    ) -> Self {
        self.relationships.push(RelationDef {
            name: name.to_string(),
            uri_name: None,
            inverse,
            cardinality,
        });
        self
    }
}

/// Every resource schema served by one API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaContainer {
    pub resources: Vec<ResourceSchema>,
}

impl SchemaContainer {
    pub fn new(resources: Vec<ResourceSchema>) -> Self {
        Self { resources }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let container: SchemaContainer = serde_json::from_str(&raw)?;
        log::info!(
            "Loaded {} resource schema(s) from {}",
            container.resources.len(),
            path.as_ref().display()
        );
        Ok(container)
    }

    pub fn exists(&self, resource_type: &ResourceType) -> bool {
        self.schema_for(resource_type).is_some()
    }

    pub fn schema_for(&self, resource_type: &ResourceType) -> Option<&ResourceSchema> {
        self.resources
            .iter()
            .find(|s| &s.resource_type == resource_type)
    }

    /// Translate a URL collection segment into the resource type it serves.
    pub fn schema_type_for_uri(&self, uri_type: &str) -> Option<&ResourceType> {
        self.resources
            .iter()
            .find(|s| s.uri_type() == uri_type)
            .map(|s| &s.resource_type)
    }
}
