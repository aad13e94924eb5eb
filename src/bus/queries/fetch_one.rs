use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::auth::{Authorizer, Decision};
use crate::bus::dispatcher::{Dispatchable, Services};
use crate::bus::message::{message, Authorize, Envelope, Hooked, Message, Validate};
use crate::bus::middleware::{
    AuthorizeMessage, LookupModelIfRequired, TriggerHooks, ValidateMessage,
};
use crate::bus::pipeline::{Destination, Handled, Pipeline};
use crate::hooks::{HookResult, ResourceHooks};
use crate::model::{Data, Outcome, Payload, RequestContext, ResourceId, ResourceType};
use crate::store::Store;
use crate::validation::{ErrorLocation, Validator, ValidatorFactory};

/// Read one resource by type and id.
#[derive(Debug, Clone)]
pub struct FetchOneQuery {
    envelope: Envelope,
    resource_type: ResourceType,
    id: ResourceId,
}

impl FetchOneQuery {
    pub fn new(context: RequestContext, resource_type: ResourceType, id: ResourceId) -> Self {
        Self {
            envelope: Envelope::new(context),
            resource_type,
            id,
        }
    }
}

message!(FetchOneQuery, |this| &this.resource_type, Some(&this.id));

#[async_trait]
impl Authorize for FetchOneQuery {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer.show(self.context(), self.model_or_fail()?).await?)
    }
}

impl Validate for FetchOneQuery {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        factory.query_one(self.context(), self.query())
    }

    fn default_validated(&self) -> Map<String, Value> {
        self.query().0.clone()
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Query
    }
}

impl Hooked for FetchOneQuery {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        match hooks.show() {
            Some(hooks) => hooks.reading(self.context(), self.query()),
            None => Ok(()),
        }
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        match hooks.show() {
            Some(hooks) => hooks.read(payload.model(), self.context(), self.query()),
            None => Ok(()),
        }
    }
}

pub struct FetchOneQueryHandler {
    store: Arc<dyn Store>,
}

impl FetchOneQueryHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Destination<FetchOneQuery> for FetchOneQueryHandler {
    async fn execute(&self, query: FetchOneQuery) -> Handled {
        let model = match query.model() {
            Some(model) => Some(model.clone()),
            None => self.store.find(&query.resource_type, &query.id).await?,
        };

        Ok(match model {
            Some(model) => Outcome::ok(Payload::new(Data::One(model))),
            None => Outcome::not_found(format!(
                "Resource {} with id {} does not exist.",
                query.resource_type, query.id
            )),
        })
    }
}

impl Dispatchable for FetchOneQuery {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        Pipeline::new()
            .through(LookupModelIfRequired::new(services.store.clone()))
            .through(AuthorizeMessage::new(services.authorizers.clone()))
            .through(ValidateMessage::new(services.validators.clone()))
            .through(TriggerHooks)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(FetchOneQueryHandler::new(services.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::*;
    use crate::model::QueryParams;
    use serde_json::json;

    #[tokio::test]
    async fn test_reads_resource_with_hooks() {
        let (dispatcher, store) = dispatcher();
        store.insert(post("1", "Hello"));
        let journal = Journal::default();
        let query = FetchOneQuery::new(RequestContext::anonymous(), rt("posts"), id("1"))
            .with_hooks(Arc::new(Recorder::new(journal.clone())));

        let outcome = dispatcher.dispatch(query).await.unwrap();

        assert_eq!(outcome.payload().unwrap().model().unwrap().attributes["title"], json!("Hello"));
        assert_eq!(*journal.lock(), vec!["reading", "read:1"]);
    }

    #[tokio::test]
    async fn test_unauthorized_read_looks_up_in_handler() {
        let (dispatcher, _) = dispatcher_with(Arc::new(DenyAll));
        let query = FetchOneQuery::new(RequestContext::anonymous(), rt("posts"), id("1"))
            .skip_authorization();

        let outcome = dispatcher.dispatch(query).await.unwrap();

        assert_eq!(outcome.errors().unwrap().status(), Some(404));
    }

    #[tokio::test]
    async fn test_invalid_query_parameter() {
        let (dispatcher, store) = dispatcher();
        store.insert(post("1", "Hello"));
        let query = FetchOneQuery::new(RequestContext::anonymous(), rt("posts"), id("1"))
            .with_query(QueryParams::from(json!({"bogus": "1"}).as_object().cloned().unwrap()));

        let outcome = dispatcher.dispatch(query).await.unwrap();

        let errors = outcome.errors().unwrap();
        assert_eq!(errors.status(), Some(422));
        let source = errors.iter().next().unwrap().source.clone().unwrap();
        assert_eq!(source.parameter.as_deref(), Some("bogus"));
    }
}
