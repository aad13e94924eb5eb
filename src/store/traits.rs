use anyhow::Result;
use serde_json::{Map, Value};

use crate::model::{Data, Model, QueryParams, ResourceId, ResourceIdentifier, ResourceType};

/// How a to-many relationship modification combines with existing members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToManyMode {
    Replace,
    Attach,
    Detach,
}

/// Persistence used by the command and query handlers.
///
/// Write methods receive the validated field map: attributes and relationship
/// linkage flattened together, keyed by field name.
///
/// `begin`, `commit` and `rollback` bracket a unit of work such as one atomic
/// operations request. Stores without transactions keep the no-op defaults.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn find(&self, resource_type: &ResourceType, id: &ResourceId) -> Result<Option<Model>>;

    async fn query_all(
        &self,
        resource_type: &ResourceType,
        query: &QueryParams,
    ) -> Result<Vec<Model>>;

    async fn create(
        &self,
        resource_type: &ResourceType,
        id: Option<ResourceId>,
        fields: &Map<String, Value>,
    ) -> Result<Model>;

    async fn update(&self, model: &Model, fields: &Map<String, Value>) -> Result<Model>;

    async fn delete(&self, model: &Model) -> Result<()>;

    /// The resources currently linked through `field`: `Data::Null` or
    /// `Data::One` for to-one relationships, `Data::Many` for to-many.
    async fn query_related(&self, model: &Model, field: &str) -> Result<Data>;

    async fn modify_to_one(
        &self,
        model: &Model,
        field: &str,
        related: Option<ResourceIdentifier>,
    ) -> Result<Option<Model>>;

    async fn modify_to_many(
        &self,
        model: &Model,
        field: &str,
        mode: ToManyMode,
        related: &[ResourceIdentifier],
    ) -> Result<Vec<Model>>;
}
