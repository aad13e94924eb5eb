use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::atomic::operations::Create;
use crate::auth::{Authorizer, Decision};
use crate::bus::dispatcher::{Dispatchable, Services};
use crate::bus::message::{message, Authorize, Envelope, Hooked, Message, Validate};
use crate::bus::middleware::{AuthorizeMessage, TriggerHooks, ValidateMessage};
use crate::bus::pipeline::{Destination, Handled, Pipeline};
use crate::hooks::{HookResult, ResourceHooks};
use crate::model::{Data, Outcome, Payload, RequestContext};
use crate::store::Store;
use crate::validation::{ErrorLocation, Validator, ValidatorFactory};

/// Create a resource.
#[derive(Debug, Clone)]
pub struct StoreCommand {
    envelope: Envelope,
    operation: Create,
}

impl StoreCommand {
    pub fn new(context: RequestContext, operation: Create) -> Self {
        Self {
            envelope: Envelope::new(context),
            operation,
        }
    }

    pub fn operation(&self) -> &Create {
        &self.operation
    }
}

message!(StoreCommand, |this| &this.operation.data.resource_type);

#[async_trait]
impl Authorize for StoreCommand {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer.store(self.context(), self.resource_type()).await?)
    }
}

impl Validate for StoreCommand {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        factory.store(self.context(), &self.operation)
    }

    fn default_validated(&self) -> Map<String, Value> {
        self.operation.data.all()
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Resource(&self.operation.data)
    }
}

impl Hooked for StoreCommand {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        if let Some(hooks) = hooks.store() {
            hooks.saving(None, self.context(), self.query())?;
            hooks.creating(self.context(), self.query())?;
        }
        Ok(())
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.store(), payload.model()) {
            hooks.created(model, self.context(), self.query())?;
            hooks.saved(model, self.context(), self.query())?;
        }
        Ok(())
    }
}

pub struct StoreCommandHandler {
    store: Arc<dyn Store>,
}

impl StoreCommandHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Destination<StoreCommand> for StoreCommandHandler {
    async fn execute(&self, command: StoreCommand) -> Handled {
        let fields = command
            .validated()
            .ok_or_else(|| anyhow!("store command reached its handler without validated data"))?;

        let model = self
            .store
            .create(command.resource_type(), command.operation.data.id.clone(), fields)
            .await?;

        Ok(Outcome::ok(Payload::new(Data::One(model))))
    }
}

impl Dispatchable for StoreCommand {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        Pipeline::new()
            .through(AuthorizeMessage::new(services.authorizers.clone()))
            .through(ValidateMessage::new(services.validators.clone()))
            .through(TriggerHooks)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(StoreCommandHandler::new(services.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::*;
    use serde_json::json;

    fn create(data: Value) -> Create {
        Create {
            target: None,
            data: serde_json::from_value(data).unwrap(),
            meta: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_creates_resource() {
        let (dispatcher, store) = dispatcher();
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "id": "1", "attributes": {"title": "Hello"}})),
        );

        let outcome = dispatcher.dispatch(command).await.unwrap();

        let model = outcome.payload().and_then(Payload::model).unwrap();
        assert_eq!(model.attributes["title"], json!("Hello"));
        assert_eq!(store.len(&rt("posts")), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_points_at_attribute() {
        let (dispatcher, store) = dispatcher();
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "attributes": {"title": 5}})),
        );

        let outcome = dispatcher.dispatch(command).await.unwrap();

        let errors = outcome.errors().unwrap();
        assert_eq!(errors.status(), Some(422));
        assert_eq!(errors.iter().next().unwrap().pointer(), Some("/data/attributes/title"));
        assert_eq!(store.len(&rt("posts")), 0);
    }

    #[tokio::test]
    async fn test_skip_validation_passes_raw_input_through() {
        let (dispatcher, _) = dispatcher();
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "attributes": {"title": 5}})),
        )
        .skip_validation();

        let pipeline = StoreCommand::pipeline(dispatcher.services());
        let outcome = pipeline.send(command.clone(), &Capture).await.unwrap();

        let validated = outcome.payload().unwrap().meta.clone();
        assert_eq!(validated, command.operation().data.all());
    }

    #[tokio::test]
    async fn test_denied_store_stops_before_the_handler() {
        let (dispatcher, store) = dispatcher_with(Arc::new(DenyAll));
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "attributes": {"title": "Hello"}})),
        );

        let outcome = dispatcher.dispatch(command.clone()).await.unwrap();
        assert_eq!(outcome.errors().unwrap().status(), Some(401));
        assert_eq!(store.len(&rt("posts")), 0);

        let outcome = dispatcher.dispatch(command.skip_authorization()).await.unwrap();
        assert!(outcome.did_succeed());
    }

    #[tokio::test]
    async fn test_hooks_run_around_the_handler() {
        let (dispatcher, _) = dispatcher();
        let journal = Journal::default();
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "id": "9", "attributes": {"title": "Hello"}})),
        )
        .with_hooks(Arc::new(Recorder::new(journal.clone())));

        let outcome = dispatcher.dispatch(command).await.unwrap();

        assert!(outcome.did_succeed());
        assert_eq!(*journal.lock(), vec!["saving", "creating", "created:9", "saved:9"]);
    }

    #[tokio::test]
    async fn test_hooks_not_reached_when_validation_fails() {
        let (dispatcher, _) = dispatcher();
        let journal = Journal::default();
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "attributes": {"title": 5}})),
        )
        .with_hooks(Arc::new(Recorder::new(journal.clone())));

        let outcome = dispatcher.dispatch(command).await.unwrap();

        assert!(outcome.did_fail());
        assert!(journal.lock().is_empty());
    }

    #[tokio::test]
    async fn test_after_hooks_skipped_when_handler_fails() {
        let (dispatcher, store) = dispatcher();
        store.insert(post("9", "Existing"));
        let journal = Journal::default();
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "id": "9", "attributes": {"title": "Hello"}})),
        )
        .with_hooks(Arc::new(Recorder::new(journal.clone())));

        assert!(dispatcher.dispatch(command).await.is_err());
        assert_eq!(*journal.lock(), vec!["saving", "creating"]);
    }

    #[tokio::test]
    async fn test_before_hook_can_halt() {
        let (dispatcher, store) = dispatcher();
        let journal = Journal::default();
        let command = StoreCommand::new(
            RequestContext::anonymous(),
            create(json!({"type": "posts", "attributes": {"title": "Hello"}})),
        )
        .with_hooks(Arc::new(Recorder::halting_on("creating", journal.clone())));

        let outcome = dispatcher.dispatch(command).await.unwrap();

        assert!(matches!(outcome, Outcome::Halted(ref response) if response.status == 202));
        assert_eq!(*journal.lock(), vec!["saving", "creating"]);
        assert_eq!(store.len(&rt("posts")), 0);
    }
}
