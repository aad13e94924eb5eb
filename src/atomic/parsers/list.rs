use serde_json::Value;

use crate::atomic::operations::ListOfOperations;
use crate::atomic::parsers::operation::OperationParser;
use crate::error::ParseError;

pub const ATOMIC_OPERATIONS: &str = "atomic:operations";

pub struct ListOfOperationsParser<'a> {
    operations: OperationParser<'a>,
}

impl<'a> ListOfOperationsParser<'a> {
    pub fn new(operations: OperationParser<'a>) -> Self {
        Self { operations }
    }

    /// Parse every operation, in order, stopping at the first failure.
    pub fn parse(&self, raw: &[Value]) -> Result<ListOfOperations, ParseError> {
        let operations = raw
            .iter()
            .enumerate()
            .map(|(index, operation)| {
                self.operations
                    .parse(operation)
                    .map_err(|err| err.within(&format!("/{}/{}", ATOMIC_OPERATIONS, index)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        ListOfOperations::new(operations)
    }

    /// Parse a whole `{"atomic:operations": [...]}` request document.
    pub fn parse_document(&self, document: &Value) -> Result<ListOfOperations, ParseError> {
        let members = document.as_object().ok_or_else(|| {
            ParseError::new("/", "Expecting the request document to be an object.")
        })?;

        match members.get(ATOMIC_OPERATIONS) {
            Some(Value::Array(operations)) => self.parse(operations),
            Some(_) => Err(ParseError::new(
                format!("/{}", ATOMIC_OPERATIONS),
                "The atomic:operations member must be an array.",
            )),
            None => Err(ParseError::new(
                "/",
                "The atomic:operations member is required.",
            )),
        }
    }
}
