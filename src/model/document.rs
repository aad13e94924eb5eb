use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON:API error object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Error {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl Error {
    pub fn new(status: u16) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Self::default()
        }
    }

    pub fn not_found() -> Self {
        Self::new(404).with_title("Not Found")
    }

    pub fn forbidden() -> Self {
        Self::new(403).with_title("Forbidden")
    }

    pub fn unauthorized() -> Self {
        Self::new(401).with_title("Unauthorized")
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.source.get_or_insert_with(ErrorSource::default).pointer = Some(pointer.into());
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.source.get_or_insert_with(ErrorSource::default).parameter = Some(parameter.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// The numeric HTTP status, if the error carries a parseable one.
    pub fn status_code(&self) -> Option<u16> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn pointer(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.pointer.as_deref())
    }
}

/// An ordered list of JSON:API errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }

    pub fn merge(mut self, other: ErrorList) -> Self {
        self.0.extend(other.0);
        self
    }

    /// The HTTP status that best describes the whole list.
    ///
    /// A single distinct status is used as-is. Several distinct statuses
    /// collapse to 400 when all are client errors, otherwise to 500.
    pub fn status(&self) -> Option<u16> {
        let statuses: Vec<u16> = self
            .0
            .iter()
            .filter_map(Error::status_code)
            .unique()
            .collect();

        match statuses.as_slice() {
            [] => None,
            [only] => Some(*only),
            many if many.iter().all(|s| (400..500).contains(s)) => Some(400),
            _ => Some(500),
        }
    }

    /// Prefix every source pointer, e.g. to locate errors inside an
    /// atomic operations document.
    pub fn with_pointer_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        for error in &mut self.0 {
            if let Some(pointer) = error.source.as_mut().and_then(|s| s.pointer.as_mut()) {
                *pointer = if pointer == "/" {
                    prefix.to_string()
                } else {
                    format!("{}{}", prefix, pointer)
                };
            }
        }
        self
    }
}

impl From<Error> for ErrorList {
    fn from(error: Error) -> Self {
        Self(vec![error])
    }
}

impl From<Vec<Error>> for ErrorList {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

impl FromIterator<Error> for ErrorList {
    fn from_iter<T: IntoIterator<Item = Error>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(statuses: &[u16]) -> ErrorList {
        statuses.iter().map(|s| Error::new(*s)).collect()
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(ErrorList::new().status(), None);
        assert_eq!(list(&[422, 422]).status(), Some(422));
        assert_eq!(list(&[404]).status(), Some(404));
        assert_eq!(list(&[403, 422]).status(), Some(400));
        assert_eq!(list(&[422, 500]).status(), Some(500));
        assert_eq!(list(&[503, 500]).status(), Some(500));
    }

    #[test]
    fn test_errors_without_status_are_ignored() {
        let errors = ErrorList::from(vec![Error::default(), Error::new(409)]);
        assert_eq!(errors.status(), Some(409));
    }

    #[test]
    fn test_pointer_prefix() {
        let errors = ErrorList::from(vec![
            Error::new(422).with_pointer("/data/attributes/title"),
            Error::new(422).with_pointer("/"),
            Error::new(400).with_parameter("include"),
        ])
        .with_pointer_prefix("/atomic:operations/1");

        let pointers: Vec<_> = errors.iter().map(Error::pointer).collect();
        assert_eq!(
            pointers,
            vec![
                Some("/atomic:operations/1/data/attributes/title"),
                Some("/atomic:operations/1"),
                None,
            ]
        );
    }

    #[test]
    fn test_serialization_skips_empty_members() {
        let json = serde_json::to_value(Error::not_found()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "404", "title": "Not Found"}));
    }
}
