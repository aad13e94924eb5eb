use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::auth::{Authorizer, Decision};
use crate::bus::dispatcher::{Dispatchable, Services};
use crate::bus::message::{message, Authorize, Envelope, Hooked, Message, Validate};
use crate::bus::middleware::{AuthorizeMessage, TriggerHooks, ValidateMessage};
use crate::bus::pipeline::{Destination, Handled, Pipeline};
use crate::hooks::{HookResult, ResourceHooks};
use crate::model::{Data, Outcome, Payload, QueryParams, RequestContext, ResourceType};
use crate::store::Store;
use crate::validation::{ErrorLocation, Validator, ValidatorFactory};

/// List the resources of one type, optionally filtered.
#[derive(Debug, Clone)]
pub struct FetchManyQuery {
    envelope: Envelope,
    resource_type: ResourceType,
}

impl FetchManyQuery {
    pub fn new(context: RequestContext, resource_type: ResourceType) -> Self {
        Self {
            envelope: Envelope::new(context),
            resource_type,
        }
    }
}

message!(FetchManyQuery, |this| &this.resource_type);

#[async_trait]
impl Authorize for FetchManyQuery {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer.index(self.context(), &self.resource_type).await?)
    }
}

impl Validate for FetchManyQuery {
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

impl Hooked for FetchManyQuery {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        match hooks.index() {
            Some(hooks) => hooks.searching(self.context(), self.query()),
            None => Ok(()),
        }
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        match (hooks.index(), &payload.data) {
            (Some(hooks), Some(models)) => hooks.searched(models, self.context(), self.query()),
            _ => Ok(()),
        }
    }
}

pub struct FetchManyQueryHandler {
    store: Arc<dyn Store>,
}

impl FetchManyQueryHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Destination<FetchManyQuery> for FetchManyQueryHandler {
    async fn execute(&self, query: FetchManyQuery) -> Handled {
        let params = query
            .validated()
            .cloned()
            .map(QueryParams::from)
            .unwrap_or_else(|| query.query().clone());
        let models = self.store.query_all(&query.resource_type, &params).await?;

        Ok(Outcome::ok(Payload::new(Data::Many(models))))
    }
}

impl Dispatchable for FetchManyQuery {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        Pipeline::new()
            .through(AuthorizeMessage::new(services.authorizers.clone()))
            .through(ValidateMessage::new(services.validators.clone()))
            .through(TriggerHooks)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(FetchManyQueryHandler::new(services.store.clone()))
    }
}
