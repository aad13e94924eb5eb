use log::debug;
use std::sync::Arc;

use crate::auth::{AllowAll, AuthorizerFactory};
use crate::bus::message::Message;
use crate::bus::pipeline::{Destination, Handled, Pipeline};
use crate::hooks::HookRegistry;
use crate::store::Store;
use crate::validation::{NoValidators, ValidatorContainer};

/// The collaborators commands and queries are executed with.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub authorizers: Arc<dyn AuthorizerFactory>,
    pub validators: Arc<dyn ValidatorContainer>,
    pub hooks: HookRegistry,
}

impl Services {
    /// Store only: everything is allowed, nothing is validated.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            authorizers: Arc::new(AllowAll),
            validators: Arc::new(NoValidators),
            hooks: HookRegistry::new(),
        }
    }

    pub fn with_authorizers(mut self, authorizers: Arc<dyn AuthorizerFactory>) -> Self {
        self.authorizers = authorizers;
        self
    }

    pub fn with_validators(mut self, validators: Arc<dyn ValidatorContainer>) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }
}

/// A message that knows its own middleware stack and handler.
pub trait Dispatchable: Message {
    fn pipeline(services: &Services) -> Pipeline<Self>;

    fn handler(services: &Services) -> Box<dyn Destination<Self>>;
}

#[derive(Clone)]
pub struct Dispatcher {
    services: Services,
}

impl Dispatcher {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn dispatch<M: Dispatchable>(&self, message: M) -> Handled {
        let pipeline = M::pipeline(&self.services);
        let handler = M::handler(&self.services);
        debug!(
            "Dispatching {} through {} middleware",
            std::any::type_name::<M>().rsplit("::").next().unwrap_or_default(),
            pipeline.len()
        );
        pipeline.send(message, handler.as_ref()).await
    }

    /// Attach the registered hooks for the message's type, unless the
    /// message already carries some.
    pub fn hooked<M: Message>(&self, message: M) -> M {
        if message.hooks().is_some() {
            return message;
        }
        match self.services.hooks.for_type(message.resource_type()) {
            Some(hooks) => message.with_hooks(hooks),
            None => message,
        }
    }
}
