pub mod schema_validator;

pub use schema_validator::{SchemaValidator, SchemaValidators};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::atomic::operations::{Create, Update};
use crate::model::{
    Error, ErrorList, Linkage, Model, QueryParams, RequestContext, ResourceObject, ResourceType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    TypeMismatch,
    MissingRequired,
    UndefinedField,
    InvalidValue,
    RelationshipError,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

/// The result of validating one message's input.
pub trait Validator: Send + Sync {
    fn fails(&self) -> bool;

    fn errors(&self) -> Vec<ValidationError>;

    /// The canonical payload to hand downstream when validation passed.
    fn validated(&self) -> Map<String, Value>;
}

/// Builds validators for one resource type. An action without a validator
/// returns `None` and its input is passed through unchanged.
pub trait ValidatorFactory: Send + Sync {
    fn store(&self, _context: &RequestContext, _operation: &Create) -> Option<Box<dyn Validator>> {
        None
    }

    fn update(
        &self,
        _context: &RequestContext,
        _operation: &Update,
        _model: &Model,
    ) -> Option<Box<dyn Validator>> {
        None
    }

    fn destroy(&self, _context: &RequestContext, _model: &Model) -> Option<Box<dyn Validator>> {
        None
    }

    fn relation(
        &self,
        _context: &RequestContext,
        _model: &Model,
        _field: &str,
        _linkage: &Linkage,
    ) -> Option<Box<dyn Validator>> {
        None
    }

    fn query_one(
        &self,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> Option<Box<dyn Validator>> {
        None
    }

    fn query_many(
        &self,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> Option<Box<dyn Validator>> {
        None
    }
}

pub trait ValidatorContainer: Send + Sync {
    fn validators_for(&self, resource_type: &ResourceType) -> Option<Arc<dyn ValidatorFactory>>;
}

/// A container with no validators at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoValidators;

impl ValidatorContainer for NoValidators {
    fn validators_for(&self, _resource_type: &ResourceType) -> Option<Arc<dyn ValidatorFactory>> {
        None
    }
}

/// Where in the request the validated input came from, which decides the
/// `source` of each resulting error.
#[derive(Debug, Clone, Copy)]
pub enum ErrorLocation<'a> {
    Resource(&'a ResourceObject),
    Relationship,
    Query,
    Nowhere,
}

impl ErrorLocation<'_> {
    fn locate(&self, error: Error, field: &str) -> Error {
        match self {
            ErrorLocation::Resource(resource) if resource.is_relationship(field) => {
                error.with_pointer(format!("/data/relationships/{}", field))
            }
            ErrorLocation::Resource(_) => error.with_pointer(format!("/data/attributes/{}", field)),
            ErrorLocation::Relationship => error.with_pointer("/data"),
            ErrorLocation::Query => error.with_parameter(field),
            ErrorLocation::Nowhere => error,
        }
    }
}

/// Turn validator errors into a 422 JSON:API error list.
pub fn to_error_list(errors: &[ValidationError], location: ErrorLocation<'_>) -> ErrorList {
    errors
        .iter()
        .map(|err| {
            let error = Error::new(422)
                .with_title("Unprocessable Entity")
                .with_detail(err.message.clone());
            location.locate(error, &err.field)
        })
        .collect()
}
