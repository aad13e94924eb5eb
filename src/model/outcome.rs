use serde_json::{Map, Value};

use crate::model::{Error, ErrorList, Model};

/// Data produced by a successful command or query.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Null,
    One(Model),
    Many(Vec<Model>),
}

impl Data {
    pub fn from_optional(model: Option<Model>) -> Self {
        model.map(Data::One).unwrap_or(Data::Null)
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            Data::One(model) => Some(model),
            _ => None,
        }
    }

    pub fn models(&self) -> Vec<&Model> {
        match self {
            Data::Null => Vec::new(),
            Data::One(model) => vec![model],
            Data::Many(models) => models.iter().collect(),
        }
    }

    /// Render as the primary data of a document: resource objects.
    pub fn to_resources(&self) -> Value {
        match self {
            Data::Null => Value::Null,
            Data::One(model) => model.to_resource_object(),
            Data::Many(models) => {
                Value::Array(models.iter().map(Model::to_resource_object).collect())
            }
        }
    }

    /// Render as relationship linkage: resource identifiers only.
    pub fn to_identifiers(&self) -> Value {
        let identifier =
            |model: &Model| serde_json::to_value(model.identifier()).unwrap_or(Value::Null);
        match self {
            Data::Null => Value::Null,
            Data::One(model) => identifier(model),
            Data::Many(models) => Value::Array(models.iter().map(identifier).collect()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub data: Option<Data>,
    pub meta: Map<String, Value>,
}

impl Payload {
    pub fn new(data: Data) -> Self {
        Self {
            data: Some(data),
            meta: Map::new(),
        }
    }

    /// A payload that carries no primary data at all (as opposed to null data).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn model(&self) -> Option<&Model> {
        self.data.as_ref().and_then(Data::model)
    }
}

/// An early response requested by a hook.
///
/// The pipeline stops as soon as one is signalled and hands it to the caller
/// untouched; it is neither a success nor a failure of the action.
#[derive(Debug, Clone, PartialEq)]
pub struct HookResponse {
    pub status: u16,
    pub body: Value,
}

impl HookResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// The terminal result of running a command or query through its pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(Payload),
    Failed(ErrorList),
    Halted(HookResponse),
}

impl Outcome {
    pub fn ok(payload: Payload) -> Self {
        Outcome::Succeeded(payload)
    }

    pub fn failed(errors: impl Into<ErrorList>) -> Self {
        Outcome::Failed(errors.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Outcome::failed(Error::not_found().with_detail(detail))
    }

    pub fn did_succeed(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn did_fail(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Succeeded(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn errors(&self) -> Option<&ErrorList> {
        match self {
            Outcome::Failed(errors) => Some(errors),
            _ => None,
        }
    }
}
