use log::debug;
use serde_json::{Map, Value};

use crate::atomic::operations::{Create, Delete, Operation, Update, UpdateToMany, UpdateToOne};
use crate::atomic::parsers::data::{
    expect_object, identifier_list, nullable_identifier, optional_object, resource_object,
};
use crate::atomic::parsers::target::HrefOrRefParser;
use crate::atomic::values::{OpCode, Target};
use crate::error::ParseError;
use crate::model::ResourceObject;

/// One candidate interpretation of a raw operation.
///
/// `Ok(None)` means the operation does not have this parser's shape and the
/// next candidate should be tried; `Err` means it does, but its content is
/// invalid.
pub trait ParsesOperation: Send + Sync {
    fn parse(
        &self,
        op: OpCode,
        operation: &Map<String, Value>,
        targets: &HrefOrRefParser<'_>,
    ) -> Result<Option<Operation>, ParseError>;
}

fn has_resource_data(operation: &Map<String, Value>) -> bool {
    operation
        .get("data")
        .and_then(Value::as_object)
        .map(|data| data.contains_key("type"))
        .unwrap_or(false)
}

fn meta(operation: &Map<String, Value>) -> Result<Map<String, Value>, ParseError> {
    optional_object(operation, "meta", "")
}

fn conflict(pointer: &str, detail: String) -> ParseError {
    ParseError::new(pointer, detail)
}

pub struct CreateParser;

impl ParsesOperation for CreateParser {
    fn parse(
        &self,
        op: OpCode,
        operation: &Map<String, Value>,
        targets: &HrefOrRefParser<'_>,
    ) -> Result<Option<Operation>, ParseError> {
        if op != OpCode::Add
            || operation.contains_key("ref")
            || targets.has_relationship(operation)
            || !has_resource_data(operation)
        {
            return Ok(None);
        }

        let data = resource_object(&operation["data"], "/data")?;
        if let Some(id) = &data.id {
            let schemas = targets.hrefs().schemas();
            let fits = schemas
                .schema_for(&data.resource_type)
                .map_or(true, |schema| schema.id_matches(id.as_str()));
            if !fits {
                return Err(ParseError::new(
                    "/data/id",
                    format!("The id {} is not valid for {}.", id, data.resource_type),
                ));
            }
        }

        let target = match targets.nullable(operation)? {
            Some(Target::Href(href)) => {
                if href.id.is_some() {
                    return Err(ParseError::new(
                        "/href",
                        "Expecting the href to address a resource collection.",
                    ));
                }
                if href.resource_type != data.resource_type {
                    return Err(conflict(
                        "/data/type",
                        format!(
                            "The resource type {} does not match the href type {}.",
                            data.resource_type, href.resource_type
                        ),
                    ));
                }
                Some(href)
            }
            _ => None,
        };

        Ok(Some(Operation::Create(Create {
            target,
            data,
            meta: meta(operation)?,
        })))
    }
}

pub struct UpdateParser;

impl UpdateParser {
    fn check_target(target: &Target, data: &ResourceObject) -> Result<(), ParseError> {
        let pointer = match target {
            Target::Href(_) => "/href",
            Target::Ref(_) => "/ref",
        };

        if target.resource_type() != &data.resource_type {
            return Err(conflict(
                "/data/type",
                format!(
                    "The resource type {} does not match the target type {}.",
                    data.resource_type,
                    target.resource_type()
                ),
            ));
        }

        if target.id().is_none() && target.lid().is_none() {
            return Err(ParseError::new(pointer, "Expecting the target to address a resource."));
        }

        if let (Some(expected), Some(actual)) = (target.id(), data.id.as_ref()) {
            if expected != actual {
                return Err(conflict(
                    "/data/id",
                    format!(
                        "The resource id {} does not match the target id {}.",
                        actual, expected
                    ),
                ));
            }
        }

        if let (Some(expected), Some(actual)) = (target.lid(), data.lid.as_ref()) {
            if expected != actual {
                return Err(conflict(
                    "/data/lid",
                    format!(
                        "The resource lid {} does not match the target lid {}.",
                        actual, expected
                    ),
                ));
            }
        }

        Ok(())
    }
}

impl ParsesOperation for UpdateParser {
    fn parse(
        &self,
        op: OpCode,
        operation: &Map<String, Value>,
        targets: &HrefOrRefParser<'_>,
    ) -> Result<Option<Operation>, ParseError> {
        if op != OpCode::Update
            || targets.has_relationship(operation)
            || !has_resource_data(operation)
        {
            return Ok(None);
        }

        let data = resource_object(&operation["data"], "/data")?;
        let target = targets.nullable(operation)?;

        match &target {
            Some(target) => Self::check_target(target, &data)?,
            None if data.id.is_none() && data.lid.is_none() => {
                return Err(ParseError::new(
                    "/data",
                    "Expecting the resource to have an id or lid member.",
                ));
            }
            None => {}
        }

        Ok(Some(Operation::Update(Update {
            target,
            data,
            meta: meta(operation)?,
        })))
    }
}

pub struct DeleteParser;

impl ParsesOperation for DeleteParser {
    fn parse(
        &self,
        op: OpCode,
        operation: &Map<String, Value>,
        targets: &HrefOrRefParser<'_>,
    ) -> Result<Option<Operation>, ParseError> {
        if op != OpCode::Remove
            || !targets.has_target(operation)
            || targets.has_relationship(operation)
        {
            return Ok(None);
        }

        let target = targets.parse(operation)?;
        if let Target::Href(href) = &target {
            if href.id.is_none() {
                return Err(ParseError::new(
                    "/href",
                    "Expecting the href to address a resource.",
                ));
            }
        }

        Ok(Some(Operation::Delete(Delete {
            target,
            meta: meta(operation)?,
        })))
    }
}

pub struct UpdateToOneParser;

impl ParsesOperation for UpdateToOneParser {
    fn parse(
        &self,
        op: OpCode,
        operation: &Map<String, Value>,
        targets: &HrefOrRefParser<'_>,
    ) -> Result<Option<Operation>, ParseError> {
        let data = match operation.get("data") {
            Some(data @ (Value::Null | Value::Object(_))) => data,
            _ => return Ok(None),
        };
        if op != OpCode::Update || !targets.has_relationship(operation) {
            return Ok(None);
        }

        let target = targets.parse(operation)?;
        let data = nullable_identifier(data, "/data")?;

        UpdateToOne::new(target, data, meta(operation)?)
            .map(|op| Some(Operation::UpdateToOne(op)))
    }
}

pub struct UpdateToManyParser;

impl ParsesOperation for UpdateToManyParser {
    fn parse(
        &self,
        op: OpCode,
        operation: &Map<String, Value>,
        targets: &HrefOrRefParser<'_>,
    ) -> Result<Option<Operation>, ParseError> {
        let data = match operation.get("data") {
            Some(data @ Value::Array(_)) => data,
            _ => return Ok(None),
        };
        if !targets.has_relationship(operation) {
            return Ok(None);
        }

        let target = targets.parse(operation)?;
        let data = identifier_list(data, "/data")?;

        UpdateToMany::new(op, target, data, meta(operation)?)
            .map(|op| Some(Operation::UpdateToMany(op)))
    }
}

// Order matters: relationship presence is decided before resource data.
static ADD_CANDIDATES: [&dyn ParsesOperation; 2] = [&CreateParser, &UpdateToManyParser];
static UPDATE_CANDIDATES: [&dyn ParsesOperation; 3] =
    [&UpdateParser, &UpdateToOneParser, &UpdateToManyParser];
static REMOVE_CANDIDATES: [&dyn ParsesOperation; 2] = [&DeleteParser, &UpdateToManyParser];

/// Classifies a raw operation by trying each candidate parser for its `op`
/// in turn.
pub struct OperationParser<'a> {
    targets: HrefOrRefParser<'a>,
}

impl<'a> OperationParser<'a> {
    pub fn new(targets: HrefOrRefParser<'a>) -> Self {
        Self { targets }
    }

    fn candidates(op: OpCode) -> &'static [&'static dyn ParsesOperation] {
        match op {
            OpCode::Add => &ADD_CANDIDATES,
            OpCode::Update => &UPDATE_CANDIDATES,
            OpCode::Remove => &REMOVE_CANDIDATES,
        }
    }

    pub fn parse(&self, raw: &Value) -> Result<Operation, ParseError> {
        let operation = expect_object(raw, "")?;
        let op = match operation.get("op") {
            Some(Value::String(value)) => OpCode::parse(value).ok_or_else(|| {
                ParseError::new("/op", format!("The op member {} is not supported.", value))
            })?,
            Some(_) => return Err(ParseError::new("/op", "The op member must be a string.")),
            None => return Err(ParseError::new("", "The op member is required.")),
        };

        for candidate in Self::candidates(op) {
            if let Some(parsed) = candidate.parse(op, operation, &self.targets)? {
                debug!("Classified {} operation on type {}", op, parsed.resource_type());
                return Ok(parsed);
            }
        }

        Err(ParseError::new(
            "",
            format!("The {} operation does not have a recognised shape.", op),
        ))
    }
}
