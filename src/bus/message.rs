//! The state shared by every command and query, and the capabilities the
//! generic middleware needs from them.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::auth::{Authorizer, Decision};
use crate::hooks::{HookResult, ResourceHooks};
use crate::model::{Model, Payload, QueryParams, RequestContext, ResourceId, ResourceType};
use crate::validation::{ErrorLocation, Validator, ValidatorFactory};

#[derive(Clone, Default)]
pub struct Envelope {
    pub(crate) context: RequestContext,
    pub(crate) model: Option<Model>,
    pub(crate) validated: Option<Map<String, Value>>,
    pub(crate) skip_authorization: bool,
    pub(crate) skip_validation: bool,
    pub(crate) hooks: Option<Arc<dyn ResourceHooks>>,
    pub(crate) query: QueryParams,
}

impl Envelope {
    pub fn new(context: RequestContext) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("context", &self.context)
            .field("model", &self.model)
            .field("validated", &self.validated)
            .field("skip_authorization", &self.skip_authorization)
            .field("skip_validation", &self.skip_validation)
            .field("hooks", &self.hooks.is_some())
            .field("query", &self.query)
            .finish()
    }
}

/// A command or query travelling through a pipeline.
///
/// Messages are values: every `with_*`/`skip_*` method leaves the receiver
/// untouched and returns a modified copy.
pub trait Message: Clone + Send + Sync + 'static {
    fn envelope(&self) -> &Envelope;

    fn envelope_mut(&mut self) -> &mut Envelope;

    fn resource_type(&self) -> &ResourceType;

    /// The id of the resource the message is about, if it addresses one.
    fn id(&self) -> Option<&ResourceId> {
        None
    }

    fn context(&self) -> &RequestContext {
        &self.envelope().context
    }

    fn model(&self) -> Option<&Model> {
        self.envelope().model.as_ref()
    }

    fn validated(&self) -> Option<&Map<String, Value>> {
        self.envelope().validated.as_ref()
    }

    fn is_validated(&self) -> bool {
        self.envelope().validated.is_some()
    }

    fn must_authorize(&self) -> bool {
        !self.envelope().skip_authorization
    }

    fn must_validate(&self) -> bool {
        !self.envelope().skip_validation
    }

    fn hooks(&self) -> Option<&Arc<dyn ResourceHooks>> {
        self.envelope().hooks.as_ref()
    }

    fn query(&self) -> &QueryParams {
        &self.envelope().query
    }

    fn model_or_fail(&self) -> anyhow::Result<&Model> {
        self.model().ok_or_else(|| {
            anyhow::anyhow!(
                "expecting a {} model to be set on the message",
                self.resource_type()
            )
        })
    }

    fn with_model(&self, model: Model) -> Self {
        let mut copy = self.clone();
        copy.envelope_mut().model = Some(model);
        copy
    }

    fn with_validated(&self, validated: Map<String, Value>) -> Self {
        let mut copy = self.clone();
        copy.envelope_mut().validated = Some(validated);
        copy
    }

    fn with_hooks(&self, hooks: Arc<dyn ResourceHooks>) -> Self {
        let mut copy = self.clone();
        copy.envelope_mut().hooks = Some(hooks);
        copy
    }

    fn with_query(&self, query: QueryParams) -> Self {
        let mut copy = self.clone();
        copy.envelope_mut().query = query;
        copy
    }

    fn skip_authorization(&self) -> Self {
        let mut copy = self.clone();
        copy.envelope_mut().skip_authorization = true;
        copy
    }

    fn skip_validation(&self) -> Self {
        let mut copy = self.clone();
        copy.envelope_mut().skip_validation = true;
        copy
    }
}

/// Implements [`Message`] for a struct with an `envelope` field, given an
/// expression for the resource type and, optionally, one for the id.
macro_rules! message {
    ($name:ty, |$this:ident| $resource_type:expr) => {
        impl $crate::bus::message::Message for $name {
            fn envelope(&self) -> &$crate::bus::message::Envelope {
                &self.envelope
            }

            fn envelope_mut(&mut self) -> &mut $crate::bus::message::Envelope {
                &mut self.envelope
            }

            fn resource_type(&self) -> &$crate::model::ResourceType {
                let $this = self;
                $resource_type
            }
        }
    };
    ($name:ty, |$this:ident| $resource_type:expr, $id:expr) => {
        impl $crate::bus::message::Message for $name {
            fn envelope(&self) -> &$crate::bus::message::Envelope {
                &self.envelope
            }

            fn envelope_mut(&mut self) -> &mut $crate::bus::message::Envelope {
                &mut self.envelope
            }

            fn resource_type(&self) -> &$crate::model::ResourceType {
                let $this = self;
                $resource_type
            }

            fn id(&self) -> Option<&$crate::model::ResourceId> {
                let $this = self;
                $id
            }
        }
    };
}

pub(crate) use message;

#[async_trait]
pub trait Authorize: Message {
    /// `Err` is reserved for exceptional conditions such as an
    /// [`AuthorizationError`](crate::error::AuthorizationError) raised by
    /// the authorizer.
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision>;
}

pub trait Validate: Message {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>>;

    /// What counts as validated input when no validator applies.
    fn default_validated(&self) -> Map<String, Value>;

    fn error_location(&self) -> ErrorLocation<'_>;
}

pub trait Hooked: Message {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult;

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult;
}
