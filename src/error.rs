use thiserror::Error;

use crate::model::{Error as JsonApiError, ErrorList};

/// A value that could not be turned into a resource type or id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("{0} must be a non-empty string")]
    Empty(&'static str),
}

/// An href that does not match any route served by this API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("href '{href}' does not resolve to a resource, resource collection or relationship")]
pub struct ResolutionError {
    pub href: String,
}

/// A malformed atomic operations document, or a malformed member of one.
///
/// `pointer` is a JSON pointer relative to the value that was being parsed.
/// Parsers higher up the tree prefix it as the error travels outwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct ParseError {
    pub pointer: String,
    pub detail: String,
}

impl ParseError {
    pub fn new(pointer: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            detail: detail.into(),
        }
    }

    /// Nest this error under `prefix`, e.g. `/atomic:operations/2`.
    pub fn within(mut self, prefix: &str) -> Self {
        self.pointer = format!("{}{}", prefix.trim_end_matches('/'), self.pointer);
        self
    }

    pub fn to_error_list(&self) -> ErrorList {
        ErrorList::from(
            JsonApiError::new(400)
                .with_title("Bad Request")
                .with_detail(self.detail.clone())
                .with_pointer(if self.pointer.is_empty() {
                    "/".to_string()
                } else {
                    self.pointer.clone()
                }),
        )
    }
}

impl From<ResolutionError> for ParseError {
    fn from(err: ResolutionError) -> Self {
        ParseError::new("/href", err.to_string())
    }
}

/// Raised by an authorizer instead of returning a denial body.
///
/// These propagate past the pipeline as errors rather than being folded
/// into an `Outcome`; the HTTP layer maps them to a bare status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("this action is unauthorized: {0}")]
    Forbidden(String),
}

impl AuthorizationError {
    pub fn status(&self) -> u16 {
        match self {
            AuthorizationError::Unauthenticated => 401,
            AuthorizationError::Forbidden(_) => 403,
        }
    }
}
