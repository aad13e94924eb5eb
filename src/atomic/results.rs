use serde_json::{json, Map, Value};

use crate::model::{ErrorList, HookResponse, Payload};

pub const ATOMIC_RESULTS: &str = "atomic:results";

/// One entry of `atomic:results`, in operation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOfResults(Vec<Payload>);

impl ListOfResults {
    pub fn new(results: Vec<Payload>) -> Self {
        Self(results)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Payload> {
        self.0.iter()
    }

    /// Whether no result carries data or meta, in which case the response
    /// may have no body at all.
    pub fn all_empty(&self) -> bool {
        self.0.iter().all(|result| !result.has_data() && result.meta.is_empty())
    }

    pub fn to_value(&self) -> Value {
        let results: Vec<Value> = self
            .0
            .iter()
            .map(|result| {
                let mut object = Map::new();
                if let Some(data) = &result.data {
                    object.insert("data".into(), data.to_resources());
                }
                if !result.meta.is_empty() {
                    object.insert("meta".into(), Value::Object(result.meta.clone()));
                }
                Value::Object(object)
            })
            .collect();
        json!({ ATOMIC_RESULTS: results })
    }
}

/// The outcome of a whole atomic request.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    Succeeded(ListOfResults),
    Failed(ErrorList),
    Halted(HookResponse),
}
