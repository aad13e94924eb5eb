use serde_json::{Map, Value};

use crate::atomic::parsers::href::HrefParser;
use crate::atomic::parsers::reference::RefParser;
use crate::atomic::values::{Href, Target};
use crate::error::ParseError;

/// Picks the `href` or `ref` member of an operation and parses it.
pub struct HrefOrRefParser<'a> {
    hrefs: HrefParser<'a>,
    refs: RefParser,
}

impl<'a> HrefOrRefParser<'a> {
    pub fn new(hrefs: HrefParser<'a>, refs: RefParser) -> Self {
        Self { hrefs, refs }
    }

    pub fn hrefs(&self) -> &HrefParser<'a> {
        &self.hrefs
    }

    /// Parse the target, preferring `href` when both are present.
    pub fn parse(&self, operation: &Map<String, Value>) -> Result<Target, ParseError> {
        match self.nullable(operation)? {
            Some(target) => Ok(target),
            None => Err(ParseError::new(
                "",
                "Expecting the operation to have an href or ref member.",
            )),
        }
    }

    pub fn nullable(&self, operation: &Map<String, Value>) -> Result<Option<Target>, ParseError> {
        if let Some(href) = operation.get("href") {
            let href = href
                .as_str()
                .ok_or_else(|| ParseError::new("/href", "The href member must be a string."))?;
            return Ok(Some(Target::Href(self.hrefs.parse(&Href::new(href))?)));
        }

        match operation.get("ref") {
            Some(reference) => self.refs.parse(reference).map(|r| Some(Target::Ref(r))),
            None => Ok(None),
        }
    }

    pub fn has_target(&self, operation: &Map<String, Value>) -> bool {
        operation.contains_key("href") || operation.contains_key("ref")
    }

    /// Whether the operation targets a relationship, without failing on
    /// targets that turn out to be invalid.
    pub fn has_relationship(&self, operation: &Map<String, Value>) -> bool {
        if let Some(href) = operation.get("href") {
            return href
                .as_str()
                .map(|href| self.hrefs.has_relationship(&Href::new(href)))
                .unwrap_or(false);
        }

        operation
            .get("ref")
            .and_then(Value::as_object)
            .map(|reference| reference.contains_key("relationship"))
            .unwrap_or(false)
    }
}
