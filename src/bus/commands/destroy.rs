use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::atomic::operations::Delete;
use crate::auth::{Authorizer, Decision};
use crate::bus::dispatcher::{Dispatchable, Services};
use crate::bus::message::{message, Authorize, Envelope, Hooked, Message, Validate};
use crate::bus::middleware::{AuthorizeMessage, SetModelIfMissing, TriggerHooks, ValidateMessage};
use crate::bus::pipeline::{Destination, Handled, Pipeline};
use crate::hooks::{HookResult, ResourceHooks};
use crate::model::{Outcome, Payload, RequestContext};
use crate::store::Store;
use crate::validation::{ErrorLocation, Validator, ValidatorFactory};

/// Delete a resource.
#[derive(Debug, Clone)]
pub struct DestroyCommand {
    envelope: Envelope,
    operation: Delete,
}

impl DestroyCommand {
    pub fn new(context: RequestContext, operation: Delete) -> Self {
        Self {
            envelope: Envelope::new(context),
            operation,
        }
    }

    pub fn operation(&self) -> &Delete {
        &self.operation
    }
}

message!(DestroyCommand, |this| this.operation.target.resource_type(), this.operation.target.id());

#[async_trait]
impl Authorize for DestroyCommand {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer.destroy(self.context(), self.model_or_fail()?).await?)
    }
}

impl Validate for DestroyCommand {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        factory.destroy(self.context(), self.model()?)
    }

    fn default_validated(&self) -> Map<String, Value> {
        Map::new()
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Nowhere
    }
}

impl Hooked for DestroyCommand {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.destroy(), self.model()) {
            hooks.deleting(model, self.context())?;
        }
        Ok(())
    }

    fn after(&self, hooks: &dyn ResourceHooks, _payload: &Payload) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.destroy(), self.model()) {
            hooks.deleted(model, self.context())?;
        }
        Ok(())
    }
}

pub struct DestroyCommandHandler {
    store: Arc<dyn Store>,
}

impl DestroyCommandHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Destination<DestroyCommand> for DestroyCommandHandler {
    async fn execute(&self, command: DestroyCommand) -> Handled {
        self.store.delete(command.model_or_fail()?).await?;
        Ok(Outcome::ok(Payload::none()))
    }
}

impl Dispatchable for DestroyCommand {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        Pipeline::new()
            .through(SetModelIfMissing::new(services.store.clone()))
            .through(AuthorizeMessage::new(services.authorizers.clone()))
            .through(ValidateMessage::new(services.validators.clone()))
            .through(TriggerHooks)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(DestroyCommandHandler::new(services.store.clone()))
    }
}
