//! Authorization collaborators.
//!
//! An authorizer answers one question per action. It can allow, deny with a
//! JSON:API error body, or raise an [`AuthorizationError`] which escapes the
//! pipeline entirely.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AuthorizationError;
use crate::model::{Error, ErrorList, Model, RequestContext, ResourceType};

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Deny(ErrorList),
}

impl Decision {
    /// The conventional denial: 401 for anonymous requests, 403 otherwise.
    pub fn deny(context: &RequestContext) -> Self {
        let error = if context.is_authenticated() {
            Error::forbidden()
        } else {
            Error::unauthorized()
        };
        Decision::Deny(ErrorList::from(error))
    }

    pub fn from_bool(allowed: bool, context: &RequestContext) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Self::deny(context)
        }
    }
}

pub type Authorization = Result<Decision, AuthorizationError>;

/// Per-resource-type authorization. Every check allows unless overridden.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn index(
        &self,
        _context: &RequestContext,
        _resource_type: &ResourceType,
    ) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn store(
        &self,
        _context: &RequestContext,
        _resource_type: &ResourceType,
    ) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn show(&self, _context: &RequestContext, _model: &Model) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn update(&self, _context: &RequestContext, _model: &Model) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn destroy(&self, _context: &RequestContext, _model: &Model) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn show_related(
        &self,
        _context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn show_relationship(
        &self,
        _context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn update_relationship(
        &self,
        _context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn attach_relationship(
        &self,
        _context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::Allow)
    }

    async fn detach_relationship(
        &self,
        _context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::Allow)
    }
}

pub trait AuthorizerFactory: Send + Sync {
    fn make(&self, resource_type: &ResourceType) -> Arc<dyn Authorizer>;
}

/// Allows everything, for every resource type.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {}

impl AuthorizerFactory for AllowAll {
    fn make(&self, _resource_type: &ResourceType) -> Arc<dyn Authorizer> {
        Arc::new(AllowAll)
    }
}
