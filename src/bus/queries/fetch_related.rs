//! Reading through a relationship: the related resources themselves, or
//! just the linkage.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::auth::{Authorizer, Decision};
use crate::bus::dispatcher::{Dispatchable, Services};
use crate::bus::message::{message, Authorize, Envelope, Hooked, Message, Validate};
use crate::bus::middleware::{AuthorizeMessage, SetModelIfMissing, TriggerHooks, ValidateMessage};
use crate::bus::pipeline::{Destination, Handled, Pipeline};
use crate::hooks::{HookResult, ResourceHooks};
use crate::model::{Outcome, Payload, RequestContext, ResourceId, ResourceType};
use crate::store::Store;
use crate::validation::{ErrorLocation, Validator, ValidatorFactory};

#[derive(Debug, Clone)]
pub struct FetchRelatedQuery {
    envelope: Envelope,
    resource_type: ResourceType,
    id: ResourceId,
    field: String,
}

impl FetchRelatedQuery {
    pub fn new(
        context: RequestContext,
        resource_type: ResourceType,
        id: ResourceId,
        field: impl Into<String>,
    ) -> Self {
        Self {
            envelope: Envelope::new(context),
            resource_type,
            id,
            field: field.into(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }
}

#[derive(Debug, Clone)]
pub struct FetchRelationshipQuery {
    envelope: Envelope,
    resource_type: ResourceType,
    id: ResourceId,
    field: String,
}

impl FetchRelationshipQuery {
    pub fn new(
        context: RequestContext,
        resource_type: ResourceType,
        id: ResourceId,
        field: impl Into<String>,
    ) -> Self {
        Self {
            envelope: Envelope::new(context),
            resource_type,
            id,
            field: field.into(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }
}

message!(FetchRelatedQuery, |this| &this.resource_type, Some(&this.id));
message!(FetchRelationshipQuery, |this| &this.resource_type, Some(&this.id));

#[async_trait]
impl Authorize for FetchRelatedQuery {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer
            .show_related(self.context(), self.model_or_fail()?, &self.field)
            .await?)
    }
}

#[async_trait]
impl Authorize for FetchRelationshipQuery {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer
            .show_relationship(self.context(), self.model_or_fail()?, &self.field)
            .await?)
    }
}

impl Validate for FetchRelatedQuery {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        factory.query_many(self.context(), self.query())
    }

    fn default_validated(&self) -> Map<String, Value> {
        self.query().0.clone()
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Query
    }
}

impl Validate for FetchRelationshipQuery {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        factory.query_many(self.context(), self.query())
    }

    fn default_validated(&self) -> Map<String, Value> {
        self.query().0.clone()
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Query
    }
}

impl Hooked for FetchRelatedQuery {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.show_related(), self.model()) {
            hooks.reading_related(model, &self.field, self.context(), self.query())?;
        }
        Ok(())
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        if let (Some(hooks), Some(model), Some(related)) =
            (hooks.show_related(), self.model(), &payload.data)
        {
            hooks.read_related(model, &self.field, related, self.context(), self.query())?;
        }
        Ok(())
    }
}

impl Hooked for FetchRelationshipQuery {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.show_relationship(), self.model()) {
            hooks.reading_relationship(model, &self.field, self.context(), self.query())?;
        }
        Ok(())
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        if let (Some(hooks), Some(model), Some(related)) =
            (hooks.show_relationship(), self.model(), &payload.data)
        {
            hooks.read_relationship(model, &self.field, related, self.context(), self.query())?;
        }
        Ok(())
    }
}

/// Answers both relationship queries; rendering the result as resources or
/// as identifiers is up to the caller.
pub struct FetchRelatedQueryHandler {
    store: Arc<dyn Store>,
}

impl FetchRelatedQueryHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn related<M: Message>(&self, query: &M, field: &str) -> Handled {
        let related = self.store.query_related(query.model_or_fail()?, field).await?;
        Ok(Outcome::ok(Payload::new(related)))
    }
}

#[async_trait]
impl Destination<FetchRelatedQuery> for FetchRelatedQueryHandler {
    async fn execute(&self, query: FetchRelatedQuery) -> Handled {
        self.related(&query, &query.field).await
    }
}

#[async_trait]
impl Destination<FetchRelationshipQuery> for FetchRelatedQueryHandler {
    async fn execute(&self, query: FetchRelationshipQuery) -> Handled {
        self.related(&query, &query.field).await
    }
}

impl Dispatchable for FetchRelatedQuery {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        Pipeline::new()
            .through(SetModelIfMissing::new(services.store.clone()))
            .through(AuthorizeMessage::new(services.authorizers.clone()))
            .through(ValidateMessage::new(services.validators.clone()))
            .through(TriggerHooks)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(FetchRelatedQueryHandler::new(services.store.clone()))
    }
}

impl Dispatchable for FetchRelationshipQuery {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        Pipeline::new()
            .through(SetModelIfMissing::new(services.store.clone()))
            .through(AuthorizeMessage::new(services.authorizers.clone()))
            .through(ValidateMessage::new(services.validators.clone()))
            .through(TriggerHooks)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(FetchRelatedQueryHandler::new(services.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::*;
    use crate::model::{Data, Linkage, Model, ResourceIdentifier};

    fn seeded() -> (crate::bus::Dispatcher, Arc<crate::store::MemoryStore>) {
        let (dispatcher, store) = dispatcher();
        let mut post = post("1", "Hello");
        post.relationships.insert(
            "tags".into(),
            Linkage::ToMany(vec![ResourceIdentifier::new(rt("tags"), id("a"))]),
        );
        store.insert(post);
        store.insert(Model::new(rt("tags"), id("a")));
        (dispatcher, store)
    }

    #[tokio::test]
    async fn test_related_resources() {
        let (dispatcher, _) = seeded();
        let journal = Journal::default();
        let query =
            FetchRelatedQuery::new(RequestContext::anonymous(), rt("posts"), id("1"), "tags")
                .with_hooks(Arc::new(Recorder::new(journal.clone())));

        let outcome = dispatcher.dispatch(query).await.unwrap();

        match outcome.payload().and_then(|p| p.data.clone()) {
            Some(Data::Many(models)) => assert_eq!(models[0].id, id("a")),
            other => panic!("expected many, got {:?}", other),
        }
        assert_eq!(*journal.lock(), vec!["reading_related:tags", "read_related:a"]);
    }

    #[tokio::test]
    async fn test_relationship_of_missing_resource() {
        let (dispatcher, _) = seeded();

        let outcome = dispatcher
            .dispatch(FetchRelationshipQuery::new(
                RequestContext::anonymous(),
                rt("posts"),
                id("2"),
                "tags",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.errors().unwrap().status(), Some(404));
    }

    #[tokio::test]
    async fn test_empty_to_one_is_null() {
        let (dispatcher, _) = seeded();
        let journal = Journal::default();
        let query =
            FetchRelationshipQuery::new(RequestContext::anonymous(), rt("posts"), id("1"), "author")
                .with_hooks(Arc::new(Recorder::new(journal.clone())));

        let outcome = dispatcher.dispatch(query).await.unwrap();

        assert_eq!(outcome.payload().unwrap().data, Some(Data::Null));
        assert_eq!(*journal.lock(), vec!["reading_relationship:author", "read_relationship:"]);
    }
}
