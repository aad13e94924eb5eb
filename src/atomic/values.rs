use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ResourceId, ResourceType};

/// The `op` member of an atomic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpCode {
    Add,
    Update,
    Remove,
}

impl OpCode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add" => Some(OpCode::Add),
            "update" => Some(OpCode::Update),
            "remove" => Some(OpCode::Remove),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpCode::Add => "add",
            OpCode::Update => "update",
            OpCode::Remove => "remove",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unparsed URL as supplied in an operation's `href` member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Href(String);

impl Href {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An href resolved against the server's routes and schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHref {
    pub href: Href,
    pub resource_type: ResourceType,
    pub id: Option<ResourceId>,
    pub relationship: Option<String>,
}

impl ParsedHref {
    pub fn to_ref(&self) -> Ref {
        Ref {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
            lid: None,
            relationship: self.relationship.clone(),
        }
    }
}

/// A `ref` member: addresses a resource, or one of its relationships, by
/// type plus id or lid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

impl Ref {
    pub fn new(resource_type: ResourceType, id: ResourceId) -> Self {
        Self {
            resource_type,
            id: Some(id),
            lid: None,
            relationship: None,
        }
    }

    pub fn local(resource_type: ResourceType, lid: ResourceId) -> Self {
        Self {
            resource_type,
            id: None,
            lid: Some(lid),
            relationship: None,
        }
    }

    pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationship = Some(relationship.into());
        self
    }
}

/// Where an operation is addressed: a resolved href or an explicit ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Href(ParsedHref),
    Ref(Ref),
}

impl Target {
    pub fn to_ref(&self) -> Ref {
        match self {
            Target::Href(href) => href.to_ref(),
            Target::Ref(reference) => reference.clone(),
        }
    }

    pub fn resource_type(&self) -> &ResourceType {
        match self {
            Target::Href(href) => &href.resource_type,
            Target::Ref(reference) => &reference.resource_type,
        }
    }

    pub fn id(&self) -> Option<&ResourceId> {
        match self {
            Target::Href(href) => href.id.as_ref(),
            Target::Ref(reference) => reference.id.as_ref(),
        }
    }

    pub fn lid(&self) -> Option<&ResourceId> {
        match self {
            Target::Href(_) => None,
            Target::Ref(reference) => reference.lid.as_ref(),
        }
    }

    pub fn relationship(&self) -> Option<&str> {
        match self {
            Target::Href(href) => href.relationship.as_deref(),
            Target::Ref(reference) => reference.relationship.as_deref(),
        }
    }
}
