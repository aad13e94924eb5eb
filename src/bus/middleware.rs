use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::auth::{AuthorizerFactory, Decision};
use crate::bus::message::{Authorize, Hooked, Message, Validate};
use crate::bus::pipeline::{Handled, Middleware, Next};
use crate::model::Outcome;
use crate::store::Store;
use crate::validation::{to_error_list, ValidatorContainer};

/// Loads the addressed model when the message does not carry one yet,
/// failing with a 404 when it does not exist.
pub struct SetModelIfMissing {
    store: Arc<dyn Store>,
}

impl SetModelIfMissing {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

async fn load_model<M: Message>(store: &dyn Store, message: M, next: Next<'_, M>) -> Handled {
    let Some(id) = message.id().cloned() else {
        return Ok(Outcome::not_found(format!(
            "No {} resource was identified.",
            message.resource_type()
        )));
    };

    match store.find(message.resource_type(), &id).await? {
        Some(model) => next.run(message.with_model(model)).await,
        None => {
            info!("{} {} not found", message.resource_type(), id);
            Ok(Outcome::not_found(format!(
                "Resource {} with id {} does not exist.",
                message.resource_type(),
                id
            )))
        }
    }
}

#[async_trait]
impl<M: Message> Middleware<M> for SetModelIfMissing {
    async fn handle(&self, message: M, next: Next<'_, M>) -> Handled {
        if message.model().is_some() {
            return next.run(message).await;
        }
        load_model(self.store.as_ref(), message, next).await
    }
}

/// Like [`SetModelIfMissing`], but only when authorization will need the
/// model. An unauthorized read leaves the lookup to the handler.
pub struct LookupModelIfRequired {
    store: Arc<dyn Store>,
}

impl LookupModelIfRequired {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<M: Message> Middleware<M> for LookupModelIfRequired {
    async fn handle(&self, message: M, next: Next<'_, M>) -> Handled {
        if message.model().is_some() || !message.must_authorize() {
            return next.run(message).await;
        }
        load_model(self.store.as_ref(), message, next).await
    }
}

pub struct AuthorizeMessage {
    authorizers: Arc<dyn AuthorizerFactory>,
}

impl AuthorizeMessage {
    pub fn new(authorizers: Arc<dyn AuthorizerFactory>) -> Self {
        Self { authorizers }
    }
}

#[async_trait]
impl<M: Authorize> Middleware<M> for AuthorizeMessage {
    async fn handle(&self, message: M, next: Next<'_, M>) -> Handled {
        if !message.must_authorize() {
            return next.run(message).await;
        }

        let authorizer = self.authorizers.make(message.resource_type());
        match message.authorize(authorizer.as_ref()).await? {
            Decision::Allow => next.run(message).await,
            Decision::Deny(errors) => {
                warn!("Denied access to {}", message.resource_type());
                Ok(Outcome::Failed(errors))
            }
        }
    }
}

pub struct ValidateMessage {
    validators: Arc<dyn ValidatorContainer>,
}

impl ValidateMessage {
    pub fn new(validators: Arc<dyn ValidatorContainer>) -> Self {
        Self { validators }
    }
}

#[async_trait]
impl<M: Validate> Middleware<M> for ValidateMessage {
    async fn handle(&self, message: M, next: Next<'_, M>) -> Handled {
        if message.is_validated() {
            return next.run(message).await;
        }

        if !message.must_validate() {
            let validated = message.default_validated();
            return next.run(message.with_validated(validated)).await;
        }

        let validator = self
            .validators
            .validators_for(message.resource_type())
            .and_then(|factory| message.validator(factory.as_ref()));

        let validated = match validator {
            Some(validator) if validator.fails() => {
                let errors = to_error_list(&validator.errors(), message.error_location());
                debug!(
                    "{} failed validation with {} error(s)",
                    message.resource_type(),
                    errors.len()
                );
                return Ok(Outcome::Failed(errors));
            }
            Some(validator) => validator.validated(),
            None => message.default_validated(),
        };

        next.run(message.with_validated(validated)).await
    }
}

/// Runs the message's before hook, then the rest of the chain, then the
/// after hook on success. Either hook may halt with its own response.
#[derive(Debug, Default, Clone, Copy)]
pub struct TriggerHooks;

#[async_trait]
impl<M: Hooked> Middleware<M> for TriggerHooks {
    async fn handle(&self, message: M, next: Next<'_, M>) -> Handled {
        let Some(hooks) = message.hooks().cloned() else {
            return next.run(message).await;
        };

        if let Err(response) = message.before(hooks.as_ref()) {
            debug!("Before hook on {} halted with {}", message.resource_type(), response.status);
            return Ok(Outcome::Halted(response));
        }

        let executed = message.clone();
        let outcome = next.run(message).await?;

        if let Outcome::Succeeded(payload) = &outcome {
            if let Err(response) = executed.after(hooks.as_ref(), payload) {
                debug!(
                    "After hook on {} halted with {}",
                    executed.resource_type(),
                    response.status
                );
                return Ok(Outcome::Halted(response));
            }
        }
        Ok(outcome)
    }
}
