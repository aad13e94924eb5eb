//! Replace, attach to and detach from a resource's relationships.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::atomic::operations::{UpdateToMany, UpdateToOne};
use crate::atomic::values::Target;
use crate::auth::{Authorizer, Decision};
use crate::bus::dispatcher::{Dispatchable, Services};
use crate::bus::message::{message, Authorize, Envelope, Hooked, Message, Validate};
use crate::bus::middleware::{AuthorizeMessage, SetModelIfMissing, TriggerHooks, ValidateMessage};
use crate::bus::pipeline::{Destination, Handled, Pipeline};
use crate::hooks::{HookResult, ResourceHooks};
use crate::model::{Data, Linkage, Outcome, Payload, RequestContext, ResourceIdentifier};
use crate::store::{Store, ToManyMode};
use crate::validation::{ErrorLocation, Validator, ValidatorFactory};

/// A full replacement of either kind of relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipUpdate {
    ToOne(UpdateToOne),
    ToMany(UpdateToMany),
}

impl RelationshipUpdate {
    pub fn target(&self) -> &Target {
        match self {
            RelationshipUpdate::ToOne(op) => op.target(),
            RelationshipUpdate::ToMany(op) => op.target(),
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            RelationshipUpdate::ToOne(op) => op.field_name(),
            RelationshipUpdate::ToMany(op) => op.field_name(),
        }
    }

    pub fn linkage(&self) -> Linkage {
        match self {
            RelationshipUpdate::ToOne(op) => Linkage::ToOne(op.data.clone()),
            RelationshipUpdate::ToMany(op) => Linkage::ToMany(op.data.clone()),
        }
    }
}

fn single_field(field: &str, linkage: &Linkage) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        field.to_string(),
        serde_json::to_value(linkage).unwrap_or(Value::Null),
    );
    fields
}

/// The linkage the handler should write: the validated value when a
/// validator produced one for the field, otherwise the requested one.
fn validated_linkage<M: Message>(
    message: &M,
    field: &str,
    requested: Linkage,
) -> anyhow::Result<Linkage> {
    match message.validated().and_then(|fields| fields.get(field)) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| anyhow!("validated linkage for '{}' is malformed: {}", field, err)),
        None => Ok(requested),
    }
}

fn to_many(linkage: Linkage) -> Vec<ResourceIdentifier> {
    match linkage {
        Linkage::ToMany(identifiers) => identifiers,
        Linkage::ToOne(identifier) => identifier.into_iter().collect(),
    }
}

fn relation_pipeline<M>(services: &Services) -> Pipeline<M>
where
    M: Authorize + Validate + Hooked,
{
    Pipeline::new()
        .through(SetModelIfMissing::new(services.store.clone()))
        .through(AuthorizeMessage::new(services.authorizers.clone()))
        .through(ValidateMessage::new(services.validators.clone()))
        .through(TriggerHooks)
}

#[derive(Debug, Clone)]
pub struct UpdateRelationshipCommand {
    envelope: Envelope,
    operation: RelationshipUpdate,
}

impl UpdateRelationshipCommand {
    pub fn new(context: RequestContext, operation: RelationshipUpdate) -> Self {
        Self {
            envelope: Envelope::new(context),
            operation,
        }
    }

    pub fn operation(&self) -> &RelationshipUpdate {
        &self.operation
    }

    pub fn field_name(&self) -> &str {
        self.operation.field_name()
    }
}

message!(
    UpdateRelationshipCommand,
    |this| this.operation.target().resource_type(),
    this.operation.target().id()
);

#[async_trait]
impl Authorize for UpdateRelationshipCommand {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer
            .update_relationship(self.context(), self.model_or_fail()?, self.field_name())
            .await?)
    }
}

impl Validate for UpdateRelationshipCommand {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        factory.relation(
            self.context(),
            self.model()?,
            self.field_name(),
            &self.operation.linkage(),
        )
    }

    fn default_validated(&self) -> Map<String, Value> {
        single_field(self.field_name(), &self.operation.linkage())
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Relationship
    }
}

impl Hooked for UpdateRelationshipCommand {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.update_relationship(), self.model()) {
            hooks.updating_relationship(model, self.field_name(), self.context(), self.query())?;
        }
        Ok(())
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        if let (Some(hooks), Some(model), Some(related)) =
            (hooks.update_relationship(), self.model(), &payload.data)
        {
            hooks.updated_relationship(
                model,
                self.field_name(),
                related,
                self.context(),
                self.query(),
            )?;
        }
        Ok(())
    }
}

pub struct UpdateRelationshipCommandHandler {
    store: Arc<dyn Store>,
}

#[async_trait]
impl Destination<UpdateRelationshipCommand> for UpdateRelationshipCommandHandler {
    async fn execute(&self, command: UpdateRelationshipCommand) -> Handled {
        let model = command.model_or_fail()?;
        let field = command.field_name();
        let linkage = validated_linkage(&command, field, command.operation.linkage())?;

        let related = match (&command.operation, linkage) {
            (RelationshipUpdate::ToOne(_), linkage) => {
                let related = to_many(linkage).into_iter().next();
                Data::from_optional(self.store.modify_to_one(model, field, related).await?)
            }
            (RelationshipUpdate::ToMany(_), linkage) => Data::Many(
                self.store
                    .modify_to_many(model, field, ToManyMode::Replace, &to_many(linkage))
                    .await?,
            ),
        };

        Ok(Outcome::ok(Payload::new(related)))
    }
}

impl Dispatchable for UpdateRelationshipCommand {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        relation_pipeline(services)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(UpdateRelationshipCommandHandler {
            store: services.store.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AttachRelationshipCommand {
    envelope: Envelope,
    operation: UpdateToMany,
}

impl AttachRelationshipCommand {
    pub fn new(context: RequestContext, operation: UpdateToMany) -> Self {
        Self {
            envelope: Envelope::new(context),
            operation,
        }
    }

    pub fn operation(&self) -> &UpdateToMany {
        &self.operation
    }
}

message!(
    AttachRelationshipCommand,
    |this| this.operation.target().resource_type(),
    this.operation.target().id()
);

#[async_trait]
impl Authorize for AttachRelationshipCommand {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer
            .attach_relationship(self.context(), self.model_or_fail()?, self.operation.field_name())
            .await?)
    }
}

impl Validate for AttachRelationshipCommand {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        let linkage = Linkage::ToMany(self.operation.data.clone());
        factory.relation(self.context(), self.model()?, self.operation.field_name(), &linkage)
    }

    fn default_validated(&self) -> Map<String, Value> {
        single_field(self.operation.field_name(), &Linkage::ToMany(self.operation.data.clone()))
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Relationship
    }
}

impl Hooked for AttachRelationshipCommand {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.attach_relationship(), self.model()) {
            hooks.attaching_relationship(
                model,
                self.operation.field_name(),
                self.context(),
                self.query(),
            )?;
        }
        Ok(())
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        if let (Some(hooks), Some(model), Some(related)) =
            (hooks.attach_relationship(), self.model(), &payload.data)
        {
            hooks.attached_relationship(
                model,
                self.operation.field_name(),
                related,
                self.context(),
                self.query(),
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DetachRelationshipCommand {
    envelope: Envelope,
    operation: UpdateToMany,
}

impl DetachRelationshipCommand {
    pub fn new(context: RequestContext, operation: UpdateToMany) -> Self {
        Self {
            envelope: Envelope::new(context),
            operation,
        }
    }

    pub fn operation(&self) -> &UpdateToMany {
        &self.operation
    }
}

message!(
    DetachRelationshipCommand,
    |this| this.operation.target().resource_type(),
    this.operation.target().id()
);

#[async_trait]
impl Authorize for DetachRelationshipCommand {
    async fn authorize(&self, authorizer: &dyn Authorizer) -> anyhow::Result<Decision> {
        Ok(authorizer
            .detach_relationship(self.context(), self.model_or_fail()?, self.operation.field_name())
            .await?)
    }
}

impl Validate for DetachRelationshipCommand {
    fn validator(&self, factory: &dyn ValidatorFactory) -> Option<Box<dyn Validator>> {
        let linkage = Linkage::ToMany(self.operation.data.clone());
        factory.relation(self.context(), self.model()?, self.operation.field_name(), &linkage)
    }

    fn default_validated(&self) -> Map<String, Value> {
        single_field(self.operation.field_name(), &Linkage::ToMany(self.operation.data.clone()))
    }

    fn error_location(&self) -> ErrorLocation<'_> {
        ErrorLocation::Relationship
    }
}

impl Hooked for DetachRelationshipCommand {
    fn before(&self, hooks: &dyn ResourceHooks) -> HookResult {
        if let (Some(hooks), Some(model)) = (hooks.detach_relationship(), self.model()) {
            hooks.detaching_relationship(
                model,
                self.operation.field_name(),
                self.context(),
                self.query(),
            )?;
        }
        Ok(())
    }

    fn after(&self, hooks: &dyn ResourceHooks, payload: &Payload) -> HookResult {
        if let (Some(hooks), Some(model), Some(related)) =
            (hooks.detach_relationship(), self.model(), &payload.data)
        {
            hooks.detached_relationship(
                model,
                self.operation.field_name(),
                related,
                self.context(),
                self.query(),
            )?;
        }
        Ok(())
    }
}

/// Executes attach and detach commands against the store.
pub struct ModifyToManyHandler {
    store: Arc<dyn Store>,
    mode: ToManyMode,
}

impl ModifyToManyHandler {
    async fn modify<M: Message>(&self, command: &M, operation: &UpdateToMany) -> Handled {
        let field = operation.field_name();
        let linkage = validated_linkage(command, field, Linkage::ToMany(operation.data.clone()))?;
        let related = self
            .store
            .modify_to_many(command.model_or_fail()?, field, self.mode, &to_many(linkage))
            .await?;
        Ok(Outcome::ok(Payload::new(Data::Many(related))))
    }
}

#[async_trait]
impl Destination<AttachRelationshipCommand> for ModifyToManyHandler {
    async fn execute(&self, command: AttachRelationshipCommand) -> Handled {
        self.modify(&command, &command.operation).await
    }
}

#[async_trait]
impl Destination<DetachRelationshipCommand> for ModifyToManyHandler {
    async fn execute(&self, command: DetachRelationshipCommand) -> Handled {
        self.modify(&command, &command.operation).await
    }
}

impl Dispatchable for AttachRelationshipCommand {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        relation_pipeline(services)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(ModifyToManyHandler {
            store: services.store.clone(),
            mode: ToManyMode::Attach,
        })
    }
}

impl Dispatchable for DetachRelationshipCommand {
    fn pipeline(services: &Services) -> Pipeline<Self> {
        relation_pipeline(services)
    }

    fn handler(services: &Services) -> Box<dyn Destination<Self>> {
        Box::new(ModifyToManyHandler {
            store: services.store.clone(),
            mode: ToManyMode::Detach,
        })
    }
}
