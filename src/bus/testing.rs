//! Shared fixtures for the command and query tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{Authorization, Authorizer, AuthorizerFactory, Decision};
use crate::bus::dispatcher::{Dispatcher, Services};
use crate::bus::message::Message;
use crate::bus::pipeline::{Destination, Handled};
use crate::hooks::*;
use crate::model::{
    Data, HookResponse, Model, Outcome, Payload, QueryParams, RequestContext, ResourceId,
    ResourceType,
};
use crate::schema::{Cardinality, DataType, ResourceSchema, SchemaContainer};
use crate::store::{MemoryStore, Store};
use crate::validation::SchemaValidators;

pub fn rt(value: &str) -> ResourceType {
    ResourceType::new(value).unwrap()
}

pub fn id(value: &str) -> ResourceId {
    ResourceId::new(value).unwrap()
}

pub fn schemas() -> Arc<SchemaContainer> {
    Arc::new(SchemaContainer::new(vec![
        ResourceSchema::new(rt("posts"))
            .with_attribute("title", DataType::String, true)
            .with_attribute("views", DataType::Number, false)
            .with_relationship("tags", rt("tags"), Cardinality::ToMany)
            .with_relationship("author", rt("users"), Cardinality::ToOne),
        ResourceSchema::new(rt("tags")).with_attribute("name", DataType::String, false),
        ResourceSchema::new(rt("users")).with_attribute("name", DataType::String, false),
    ]))
}

pub fn post(key: &str, title: &str) -> Model {
    let mut model = Model::new(rt("posts"), id(key));
    model.attributes.insert("title".into(), json!(title));
    model
}

pub fn dispatcher_with(authorizers: Arc<dyn AuthorizerFactory>) -> (Dispatcher, Arc<MemoryStore>) {
    let schemas = schemas();
    let store = Arc::new(MemoryStore::new(schemas.clone()));
    let services = Services::new(store.clone() as Arc<dyn Store>)
        .with_authorizers(authorizers)
        .with_validators(Arc::new(SchemaValidators::new(schemas)));
    (Dispatcher::new(services), store)
}

pub fn dispatcher() -> (Dispatcher, Arc<MemoryStore>) {
    dispatcher_with(Arc::new(crate::auth::AllowAll))
}

/// Answers with the validated data as payload meta instead of executing.
pub struct Capture;

#[async_trait]
impl<M: Message> Destination<M> for Capture {
    async fn execute(&self, message: M) -> Handled {
        let validated = message.validated().cloned().unwrap_or_default();
        Ok(Outcome::ok(Payload::none().with_meta(validated)))
    }
}

pub struct DenyAll;

impl AuthorizerFactory for DenyAll {
    fn make(&self, _resource_type: &ResourceType) -> Arc<dyn Authorizer> {
        Arc::new(DenyAll)
    }
}

#[async_trait]
impl Authorizer for DenyAll {
    async fn index(
        &self,
        context: &RequestContext,
        _resource_type: &ResourceType,
    ) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn store(
        &self,
        context: &RequestContext,
        _resource_type: &ResourceType,
    ) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn show(&self, context: &RequestContext, _model: &Model) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn update(&self, context: &RequestContext, _model: &Model) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn destroy(&self, context: &RequestContext, _model: &Model) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn show_related(
        &self,
        context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn show_relationship(
        &self,
        context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn update_relationship(
        &self,
        context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn attach_relationship(
        &self,
        context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::deny(context))
    }

    async fn detach_relationship(
        &self,
        context: &RequestContext,
        _model: &Model,
        _field: &str,
    ) -> Authorization {
        Ok(Decision::deny(context))
    }
}

pub type Journal = Arc<Mutex<Vec<String>>>;

/// Records every hook it receives, optionally halting on one of them.
pub struct Recorder {
    journal: Journal,
    halt_on: Option<&'static str>,
}

impl Recorder {
    pub fn new(journal: Journal) -> Self {
        Self { journal, halt_on: None }
    }

    pub fn halting_on(hook: &'static str, journal: Journal) -> Self {
        Self {
            journal,
            halt_on: Some(hook),
        }
    }

    fn record(&self, hook: &str, subject: Option<&str>) -> HookResult {
        let entry = match subject {
            Some(subject) => format!("{}:{}", hook, subject),
            None => hook.to_string(),
        };
        self.journal.lock().push(entry);
        if self.halt_on == Some(hook) {
            return Err(HookResponse::new(202, json!({"halted": hook})));
        }
        Ok(())
    }

    fn related(&self, hook: &str, related: &Data) -> HookResult {
        let ids: Vec<_> = related.models().iter().map(|m| m.id.to_string()).collect();
        self.record(hook, Some(&ids.join(",")))
    }
}

impl StoreHooks for Recorder {
    fn saving(
        &self,
        _model: Option<&Model>,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("saving", None)
    }

    fn creating(&self, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        self.record("creating", None)
    }

    fn created(
        &self,
        model: &Model,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("created", Some(model.id.as_str()))
    }

    fn saved(&self, model: &Model, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        self.record("saved", Some(model.id.as_str()))
    }
}

impl UpdateHooks for Recorder {
    fn saving(
        &self,
        model: Option<&Model>,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("saving", model.map(|m| m.id.as_str()))
    }

    fn updating(
        &self,
        model: &Model,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("updating", Some(model.id.as_str()))
    }

    fn updated(
        &self,
        model: &Model,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("updated", Some(model.id.as_str()))
    }

    fn saved(&self, model: &Model, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        self.record("saved", Some(model.id.as_str()))
    }
}

impl DestroyHooks for Recorder {
    fn deleting(&self, model: &Model, _context: &RequestContext) -> HookResult {
        self.record("deleting", Some(model.id.as_str()))
    }

    fn deleted(&self, model: &Model, _context: &RequestContext) -> HookResult {
        self.record("deleted", Some(model.id.as_str()))
    }
}

impl IndexHooks for Recorder {
    fn searching(&self, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        self.record("searching", None)
    }

    fn searched(
        &self,
        models: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.related("searched", models)
    }
}

impl ShowHooks for Recorder {
    fn reading(&self, _context: &RequestContext, _query: &QueryParams) -> HookResult {
        self.record("reading", None)
    }

    fn read(
        &self,
        model: Option<&Model>,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("read", model.map(|m| m.id.as_str()))
    }
}

impl ShowRelatedHooks for Recorder {
    fn reading_related(
        &self,
        _model: &Model,
        field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("reading_related", Some(field))
    }

    fn read_related(
        &self,
        _model: &Model,
        _field: &str,
        related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.related("read_related", related)
    }
}

impl ShowRelationshipHooks for Recorder {
    fn reading_relationship(
        &self,
        _model: &Model,
        field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("reading_relationship", Some(field))
    }

    fn read_relationship(
        &self,
        _model: &Model,
        _field: &str,
        related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.related("read_relationship", related)
    }
}

impl UpdateRelationshipHooks for Recorder {
    fn updating_relationship(
        &self,
        _model: &Model,
        field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("updating_relationship", Some(field))
    }

    fn updated_relationship(
        &self,
        _model: &Model,
        _field: &str,
        related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.related("updated_relationship", related)
    }
}

impl AttachRelationshipHooks for Recorder {
    fn attaching_relationship(
        &self,
        _model: &Model,
        field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("attaching_relationship", Some(field))
    }

    fn attached_relationship(
        &self,
        _model: &Model,
        _field: &str,
        related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.related("attached_relationship", related)
    }
}

impl DetachRelationshipHooks for Recorder {
    fn detaching_relationship(
        &self,
        _model: &Model,
        field: &str,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.record("detaching_relationship", Some(field))
    }

    fn detached_relationship(
        &self,
        _model: &Model,
        _field: &str,
        related: &Data,
        _context: &RequestContext,
        _query: &QueryParams,
    ) -> HookResult {
        self.related("detached_relationship", related)
    }
}

impl ResourceHooks for Recorder {
    fn store(&self) -> Option<&dyn StoreHooks> {
        Some(self)
    }

    fn update(&self) -> Option<&dyn UpdateHooks> {
        Some(self)
    }

    fn destroy(&self) -> Option<&dyn DestroyHooks> {
        Some(self)
    }

    fn index(&self) -> Option<&dyn IndexHooks> {
        Some(self)
    }

    fn show(&self) -> Option<&dyn ShowHooks> {
        Some(self)
    }

    fn show_related(&self) -> Option<&dyn ShowRelatedHooks> {
        Some(self)
    }

    fn show_relationship(&self) -> Option<&dyn ShowRelationshipHooks> {
        Some(self)
    }

    fn update_relationship(&self) -> Option<&dyn UpdateRelationshipHooks> {
        Some(self)
    }

    fn attach_relationship(&self) -> Option<&dyn AttachRelationshipHooks> {
        Some(self)
    }

    fn detach_relationship(&self) -> Option<&dyn DetachRelationshipHooks> {
        Some(self)
    }
}
