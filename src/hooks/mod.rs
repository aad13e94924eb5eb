//! Lifecycle hooks.
//!
//! A resource's hooks object advertises which actions it cares about through
//! [`ResourceHooks`]; each action has its own capability trait whose methods
//! default to doing nothing. Returning `Err(HookResponse)` from any hook stops
//! the pipeline and sends that response instead.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Data, HookResponse, Model, QueryParams, RequestContext, ResourceType};

pub type HookResult = Result<(), HookResponse>;

pub trait StoreHooks: Send + Sync {
    fn saving(
        &self,
        _model: Option<&Model>,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn creating(&self, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        Ok(())
    }

    fn created(
        &self,
        _model: &Model,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn saved(&self, _model: &Model, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        Ok(())
    }
}

pub trait UpdateHooks: Send + Sync {
    fn saving(
        &self,
        _model: Option<&Model>,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn updating(
        &self,
        _model: &Model,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn updated(
        &self,
        _model: &Model,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn saved(&self, _model: &Model, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        Ok(())
    }
}

pub trait DestroyHooks: Send + Sync {
    fn deleting(&self, _model: &Model, _context: &RequestContext) -> HookResult {
        Ok(())
    }

    fn deleted(&self, _model: &Model, _context: &RequestContext) -> HookResult {
        Ok(())
    }
}

pub trait IndexHooks: Send + Sync {
    fn searching(&self, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        Ok(())
    }

    fn searched(
        &self,
        _models: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }
}

pub trait ShowHooks: Send + Sync {
    fn reading(&self, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        Ok(())
    }

    fn read(
        &self,
        _model: Option<&Model>,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }
}

pub trait ShowRelatedHooks: Send + Sync {
    fn reading_related(
        &self,
        _model: &Model,
        _field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn read_related(
        &self,
        _model: &Model,
        _field: &str,
        _related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }
}

pub trait ShowRelationshipHooks: Send + Sync {
    fn reading_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn read_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }
}

pub trait UpdateRelationshipHooks: Send + Sync {
    fn updating_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn updated_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }
}

pub trait AttachRelationshipHooks: Send + Sync {
    fn attaching_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn attached_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }
}

pub trait DetachRelationshipHooks: Send + Sync {
    fn detaching_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }

    fn detached_relationship(
        &self,
        _model: &Model,
        _field: &str,
        _related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        Ok(())
    }
}

/// The hooks object attached to a command or query.
///
/// Implementors return `Some(self)` from the accessors of the actions they
/// implement hooks for.
pub trait ResourceHooks: Send + Sync {
    fn store(&self) -> Option<&dyn StoreHooks> {
        None
    }

    fn update(&self) -> Option<&dyn UpdateHooks> {
        None
    }

    fn destroy(&self) -> Option<&dyn DestroyHooks> {
        None
    }

    fn index(&self) -> Option<&dyn IndexHooks> {
        None
    }

    fn show(&self) -> Option<&dyn ShowHooks> {
        None
    }

    fn show_related(&self) -> Option<&dyn ShowRelatedHooks> {
        None
    }

    fn show_relationship(&self) -> Option<&dyn ShowRelationshipHooks> {
        None
    }

    fn update_relationship(&self) -> Option<&dyn UpdateRelationshipHooks> {
        None
    }

    fn attach_relationship(&self) -> Option<&dyn AttachRelationshipHooks> {
        None
    }

    fn detach_relationship(&self) -> Option<&dyn DetachRelationshipHooks> {
        None
    }
}

/// Hooks objects keyed by the resource type they belong to.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<ResourceType, Arc<dyn ResourceHooks>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, resource_type: ResourceType, hooks: Arc<dyn ResourceHooks>) -> Self {
        self.hooks.insert(resource_type, hooks);
        self
    }

    pub fn for_type(&self, resource_type: &ResourceType) -> Option<Arc<dyn ResourceHooks>> {
        self.hooks.get(resource_type).cloned()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("types", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}
