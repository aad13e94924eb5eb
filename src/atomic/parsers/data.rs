//! Field-level parsing of the JSON values that appear inside operations.
//!
//! Every function takes the JSON pointer of the value it is looking at so
//! errors point at the offending member.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::model::{
    Linkage, RelationshipObject, ResourceId, ResourceIdentifier, ResourceObject, ResourceType,
};

pub(crate) fn expect_object<'v>(
    value: &'v Value,
    pointer: &str,
) -> Result<&'v Map<String, Value>, ParseError> {
    value
        .as_object()
        .ok_or_else(|| ParseError::new(pointer, "Expecting an object."))
}

pub(crate) fn resource_type(
    object: &Map<String, Value>,
    pointer: &str,
) -> Result<ResourceType, ParseError> {
    let member = format!("{}/type", pointer);
    match object.get("type") {
        Some(Value::String(value)) => ResourceType::new(value.as_str())
            .map_err(|_| ParseError::new(&member, "The type member cannot be empty.")),
        Some(_) => Err(ParseError::new(&member, "The type member must be a string.")),
        None => Err(ParseError::new(pointer, "The type member is required.")),
    }
}

pub(crate) fn optional_id(
    object: &Map<String, Value>,
    key: &str,
    pointer: &str,
) -> Result<Option<ResourceId>, ParseError> {
    let member = format!("{}/{}", pointer, key);
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => ResourceId::new(value.as_str())
            .map(Some)
            .map_err(|_| ParseError::new(&member, format!("The {} member cannot be empty.", key))),
        Some(_) => Err(ParseError::new(
            &member,
            format!("The {} member must be a string.", key),
        )),
    }
}

pub(crate) fn optional_string(
    object: &Map<String, Value>,
    key: &str,
    pointer: &str,
) -> Result<Option<String>, ParseError> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(Some(value.clone())),
        Some(_) => Err(ParseError::new(
            format!("{}/{}", pointer, key),
            format!("The {} member must be a non-empty string.", key),
        )),
    }
}

pub(crate) fn optional_object(
    object: &Map<String, Value>,
    key: &str,
    pointer: &str,
) -> Result<Map<String, Value>, ParseError> {
    match object.get(key) {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(ParseError::new(
            format!("{}/{}", pointer, key),
            format!("The {} member must be an object.", key),
        )),
    }
}

/// A `{type, id|lid, meta?}` identifier; exactly one of id and lid.
pub fn identifier(value: &Value, pointer: &str) -> Result<ResourceIdentifier, ParseError> {
    let object = expect_object(value, pointer)?;
    let resource_type = resource_type(object, pointer)?;
    let id = optional_id(object, "id", pointer)?;
    let lid = optional_id(object, "lid", pointer)?;

    if id.is_some() == lid.is_some() {
        return Err(ParseError::new(
            pointer,
            "Expecting exactly one of the id and lid members.",
        ));
    }

    Ok(ResourceIdentifier {
        resource_type,
        id,
        lid,
        meta: optional_object(object, "meta", pointer)?,
    })
}

pub fn identifier_list(
    value: &Value,
    pointer: &str,
) -> Result<Vec<ResourceIdentifier>, ParseError> {
    let items = value
        .as_array()
        .ok_or_else(|| ParseError::new(pointer, "Expecting an array of resource identifiers."))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| identifier(item, &format!("{}/{}", pointer, index)))
        .collect()
}

/// A to-one identifier, where JSON `null` means "no related resource".
pub fn nullable_identifier(
    value: &Value,
    pointer: &str,
) -> Result<Option<ResourceIdentifier>, ParseError> {
    match value {
        Value::Null => Ok(None),
        other => identifier(other, pointer).map(Some),
    }
}

fn linkage(value: &Value, pointer: &str) -> Result<Linkage, ParseError> {
    match value {
        Value::Array(_) => identifier_list(value, pointer).map(Linkage::ToMany),
        other => nullable_identifier(other, pointer).map(Linkage::ToOne),
    }
}

fn relationships(
    object: &Map<String, Value>,
    pointer: &str,
) -> Result<BTreeMap<String, RelationshipObject>, ParseError> {
    let raw = optional_object(object, "relationships", pointer)?;
    let mut parsed = BTreeMap::new();

    for (name, value) in raw {
        let member = format!("{}/relationships/{}", pointer, name);
        let relationship = expect_object(&value, &member)?;
        let data = relationship.get("data").ok_or_else(|| {
            ParseError::new(&member, "The data member is required for relationships.")
        })?;

        parsed.insert(
            name,
            RelationshipObject {
                data: linkage(data, &format!("{}/data", member))?,
                meta: optional_object(relationship, "meta", &member)?,
            },
        );
    }

    Ok(parsed)
}

/// A full resource object as used by create and update operations.
pub fn resource_object(value: &Value, pointer: &str) -> Result<ResourceObject, ParseError> {
    let object = expect_object(value, pointer)?;
    let resource = ResourceObject {
        resource_type: resource_type(object, pointer)?,
        id: optional_id(object, "id", pointer)?,
        lid: optional_id(object, "lid", pointer)?,
        attributes: optional_object(object, "attributes", pointer)?,
        relationships: relationships(object, pointer)?,
        meta: optional_object(object, "meta", pointer)?,
    };

    let clashing = resource
        .attributes
        .keys()
        .find(|name| resource.relationships.contains_key(*name));
    if let Some(name) = clashing {
        return Err(ParseError::new(
            format!("{}/relationships/{}", pointer, name),
            format!("The field {} cannot be both an attribute and a relationship.", name),
        ));
    }

    Ok(resource)
}
