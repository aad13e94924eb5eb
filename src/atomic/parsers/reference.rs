use serde_json::Value;

use crate::atomic::parsers::data::{expect_object, optional_id, optional_string, resource_type};
use crate::atomic::values::Ref;
use crate::error::ParseError;

/// Parses the `ref` member of an operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RefParser;

impl RefParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, value: &Value) -> Result<Ref, ParseError> {
        let pointer = "/ref";
        let object = expect_object(value, pointer)?;

        let reference = Ref {
            resource_type: resource_type(object, pointer)?,
            id: optional_id(object, "id", pointer)?,
            lid: optional_id(object, "lid", pointer)?,
            relationship: optional_string(object, "relationship", pointer)?,
        };

        if reference.id.is_some() == reference.lid.is_some() {
            return Err(ParseError::new(
                pointer,
                "Expecting exactly one of the id and lid members.",
            ));
        }

        Ok(reference)
    }
}
