use anyhow::{anyhow, bail, Result};
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::{
    generate_id, Data, Linkage, Model, QueryParams, ResourceId, ResourceIdentifier, ResourceType,
};
use crate::schema::{IdPattern, SchemaContainer};
use crate::store::traits::{Store, ToManyMode};

type Table = BTreeMap<ResourceId, Model>;
type Tables = BTreeMap<ResourceType, Table>;

/// An open unit of work: the previous state of every row it touched.
///
/// Holding the gate guard keeps other transactions out until this one ends.
struct Transaction {
    _gate: OwnedMutexGuard<()>,
    undo: HashMap<(ResourceType, ResourceId), Option<Model>>,
}

impl Transaction {
    fn record(&mut self, tables: &Tables, resource_type: &ResourceType, id: &ResourceId) {
        self.undo
            .entry((resource_type.clone(), id.clone()))
            .or_insert_with(|| tables.get(resource_type).and_then(|rows| rows.get(id)).cloned());
    }
}

/// An in-process store keyed by resource type then id.
///
/// The schema decides which fields of a write are relationships; everything
/// else is stored as an attribute. Transactions are serialised: `begin` waits
/// for the previous transaction to commit or roll back. Writes made outside a
/// transaction are not isolated from one that is open.
#[derive(Clone)]
pub struct MemoryStore {
    schemas: Arc<SchemaContainer>,
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Mutex<HashMap<ResourceType, u64>>>,
    gate: Arc<AsyncMutex<()>>,
    transaction: Arc<Mutex<Option<Transaction>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("types", &self.tables.read().len())
            .field("in_transaction", &self.transaction.lock().is_some())
            .finish()
    }
}

impl MemoryStore {
    pub fn new(schemas: Arc<SchemaContainer>) -> Self {
        Self {
            schemas,
            tables: Arc::new(RwLock::new(BTreeMap::new())),
            sequences: Arc::new(Mutex::new(HashMap::new())),
            gate: Arc::new(AsyncMutex::new(())),
            transaction: Arc::new(Mutex::new(None)),
        }
    }

    /// Insert a model as-is, replacing any existing one with the same id.
    pub fn insert(&self, model: Model) {
        let mut tables = self.tables.write();
        self.record(&tables, &model.resource_type, &model.id);
        tables
            .entry(model.resource_type.clone())
            .or_default()
            .insert(model.id.clone(), model);
    }

    pub fn len(&self, resource_type: &ResourceType) -> usize {
        self.tables.read().get(resource_type).map_or(0, Table::len)
    }

    /// Remember the current state of a row before it is written.
    fn record(&self, tables: &Tables, resource_type: &ResourceType, id: &ResourceId) {
        if let Some(transaction) = self.transaction.lock().as_mut() {
            transaction.record(tables, resource_type, id);
        }
    }

    fn is_relationship(&self, resource_type: &ResourceType, field: &str) -> bool {
        self.schemas
            .schema_for(resource_type)
            .map_or(false, |schema| schema.relationship(field).is_some())
    }

    fn is_to_many(&self, resource_type: &ResourceType, field: &str) -> bool {
        self.schemas
            .schema_for(resource_type)
            .and_then(|schema| schema.relationship(field))
            .map_or(false, |relation| relation.to_many())
    }

    /// A fresh id matching the type's id pattern. Numeric types count up from
    /// the highest id ever issued or stored.
    fn next_id(&self, resource_type: &ResourceType, rows: Option<&Table>) -> Result<ResourceId> {
        let pattern = self
            .schemas
            .schema_for(resource_type)
            .map(|schema| schema.id)
            .unwrap_or_default();

        match pattern {
            IdPattern::Numeric => {
                let highest = rows
                    .into_iter()
                    .flat_map(|rows| rows.keys())
                    .filter_map(|id| id.as_str().parse::<u64>().ok())
                    .max()
                    .unwrap_or(0);
                let mut sequences = self.sequences.lock();
                let sequence = sequences.entry(resource_type.clone()).or_insert(0);
                *sequence = (*sequence).max(highest) + 1;
                Ok(ResourceId::new(sequence.to_string())?)
            }
            IdPattern::Any | IdPattern::Uuid => Ok(generate_id()),
        }
    }

    fn apply(&self, model: &mut Model, fields: &Map<String, Value>) -> Result<()> {
        for (name, value) in fields {
            if self.is_relationship(&model.resource_type, name) {
                let linkage: Linkage = serde_json::from_value(value.clone())
                    .map_err(|err| anyhow!("Invalid linkage for '{}': {}", name, err))?;
                model.relationships.insert(name.clone(), linkage);
            } else {
                model.attributes.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn lookup(tables: &Tables, identifier: &ResourceIdentifier) -> Option<Model> {
        let id = identifier.id.as_ref()?;
        tables.get(&identifier.resource_type)?.get(id).cloned()
    }

    fn resolve(tables: &Tables, linkage: Option<&Linkage>, to_many: bool) -> Data {
        match linkage {
            Some(Linkage::ToOne(Some(identifier))) => {
                Data::from_optional(Self::lookup(tables, identifier))
            }
            Some(Linkage::ToMany(identifiers)) => Data::Many(
                identifiers
                    .iter()
                    .filter_map(|identifier| Self::lookup(tables, identifier))
                    .collect(),
            ),
            Some(Linkage::ToOne(None)) => Data::Null,
            None if to_many => Data::Many(Vec::new()),
            None => Data::Null,
        }
    }

    /// Read, change and write one relationship under a single write lock, so
    /// concurrent modifications of the same relationship all land.
    fn modify_linkage<F>(&self, model: &Model, field: &str, change: F) -> Result<Data>
    where
        F: FnOnce(Option<&Linkage>) -> Linkage,
    {
        let mut tables = self.tables.write();
        self.record(&tables, &model.resource_type, &model.id);

        let stored = tables
            .get_mut(&model.resource_type)
            .and_then(|rows| rows.get_mut(&model.id))
            .ok_or_else(|| anyhow!("{} {} no longer exists", model.resource_type, model.id))?;
        let linkage = change(stored.relationships.get(field));
        stored.relationships.insert(field.to_string(), linkage.clone());

        Ok(Self::resolve(&tables, Some(&linkage), linkage.is_to_many()))
    }
}

fn matches_filter(model: &Model, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| {
        if key == "id" {
            return match expected {
                Value::Array(ids) => ids.iter().any(|id| id.as_str() == Some(model.id.as_str())),
                Value::String(id) => id.split(',').any(|id| id == model.id.as_str()),
                _ => false,
            };
        }
        match (model.attributes.get(key), expected) {
            (Some(Value::String(actual)), Value::String(expected)) => actual == expected,
            (Some(actual), Value::String(expected)) => actual.to_string() == *expected,
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        }
    })
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<()> {
        let gate = self.gate.clone().lock_owned().await;
        let mut transaction = self.transaction.lock();
        if transaction.is_some() {
            bail!("A transaction is already open");
        }
        *transaction = Some(Transaction {
            _gate: gate,
            undo: HashMap::new(),
        });
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.transaction
            .lock()
            .take()
            .map(drop)
            .ok_or_else(|| anyhow!("No transaction to commit"))
    }

    async fn rollback(&self) -> Result<()> {
        let Some(transaction) = self.transaction.lock().take() else {
            bail!("No transaction to roll back");
        };

        let mut tables = self.tables.write();
        for ((resource_type, id), previous) in transaction.undo {
            let rows = tables.entry(resource_type).or_default();
            match previous {
                Some(model) => {
                    rows.insert(id, model);
                }
                None => {
                    rows.remove(&id);
                }
            }
        }
        debug!("Rolled back transaction");
        Ok(())
    }

    async fn find(&self, resource_type: &ResourceType, id: &ResourceId) -> Result<Option<Model>> {
        Ok(self
            .tables
            .read()
            .get(resource_type)
            .and_then(|rows| rows.get(id))
            .cloned())
    }

    async fn query_all(
        &self,
        resource_type: &ResourceType,
        query: &QueryParams,
    ) -> Result<Vec<Model>> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(resource_type) else {
            return Ok(Vec::new());
        };
        Ok(match query.filter() {
            Some(filter) => rows
                .values()
                .filter(|model| matches_filter(model, filter))
                .cloned()
                .collect(),
            None => rows.values().cloned().collect(),
        })
    }

    async fn create(
        &self,
        resource_type: &ResourceType,
        id: Option<ResourceId>,
        fields: &Map<String, Value>,
    ) -> Result<Model> {
        let mut tables = self.tables.write();
        let id = match id {
            Some(id) => id,
            None => self.next_id(resource_type, tables.get(resource_type))?,
        };
        let mut model = Model::new(resource_type.clone(), id);
        self.apply(&mut model, fields)?;

        if tables.get(resource_type).map_or(false, |rows| rows.contains_key(&model.id)) {
            bail!("{} {} already exists", resource_type, model.id);
        }
        self.record(&tables, resource_type, &model.id);
        tables
            .entry(resource_type.clone())
            .or_default()
            .insert(model.id.clone(), model.clone());
        debug!("Created {} {}", resource_type, model.id);
        Ok(model)
    }

    async fn update(&self, model: &Model, fields: &Map<String, Value>) -> Result<Model> {
        let mut tables = self.tables.write();
        self.record(&tables, &model.resource_type, &model.id);
        let stored = tables
            .get_mut(&model.resource_type)
            .and_then(|rows| rows.get_mut(&model.id))
            .ok_or_else(|| anyhow!("{} {} no longer exists", model.resource_type, model.id))?;
        self.apply(stored, fields)?;
        Ok(stored.clone())
    }

    async fn delete(&self, model: &Model) -> Result<()> {
        let mut tables = self.tables.write();
        self.record(&tables, &model.resource_type, &model.id);
        let removed = tables
            .get_mut(&model.resource_type)
            .and_then(|rows| rows.remove(&model.id));
        if removed.is_none() {
            bail!("{} {} no longer exists", model.resource_type, model.id);
        }
        debug!("Deleted {} {}", model.resource_type, model.id);
        Ok(())
    }

    async fn query_related(&self, model: &Model, field: &str) -> Result<Data> {
        let tables = self.tables.read();
        let current = tables
            .get(&model.resource_type)
            .and_then(|rows| rows.get(&model.id))
            .unwrap_or(model);
        Ok(Self::resolve(
            &tables,
            current.relationships.get(field),
            self.is_to_many(&model.resource_type, field),
        ))
    }

    async fn modify_to_one(
        &self,
        model: &Model,
        field: &str,
        related: Option<ResourceIdentifier>,
    ) -> Result<Option<Model>> {
        let related = self.modify_linkage(model, field, |_| Linkage::ToOne(related))?;
        Ok(related.model().cloned())
    }

    async fn modify_to_many(
        &self,
        model: &Model,
        field: &str,
        mode: ToManyMode,
        related: &[ResourceIdentifier],
    ) -> Result<Vec<Model>> {
        let related = self.modify_linkage(model, field, |current| {
            let current = match current {
                Some(Linkage::ToMany(identifiers)) => identifiers.clone(),
                _ => Vec::new(),
            };

            Linkage::ToMany(match mode {
                ToManyMode::Replace => related.to_vec(),
                ToManyMode::Attach => {
                    let mut members = current;
                    for identifier in related {
                        if !members.iter().any(|member| member.same_resource(identifier)) {
                            members.push(identifier.clone());
                        }
                    }
                    members
                }
                ToManyMode::Detach => current
                    .into_iter()
                    .filter(|member| {
                        !related.iter().any(|identifier| identifier.same_resource(member))
                    })
                    .collect(),
            })
        })?;

        Ok(match related {
            Data::Many(models) => models,
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, DataType, ResourceSchema};
    use serde_json::json;

    fn rt(value: &str) -> ResourceType {
        ResourceType::new(value).unwrap()
    }

    fn id(value: &str) -> ResourceId {
        ResourceId::new(value).unwrap()
    }

    fn store() -> MemoryStore {
        let schemas = SchemaContainer::new(vec![
            ResourceSchema::new(rt("posts"))
                .with_attribute("title", DataType::String, true)
                .with_relationship("tags", rt("tags"), Cardinality::ToMany)
                .with_relationship("author", rt("users"), Cardinality::ToOne),
            ResourceSchema::new(rt("tags")).with_attribute("name", DataType::String, false),
            ResourceSchema::new(rt("users")),
            ResourceSchema::new(rt("orders")).with_id(IdPattern::Numeric),
            ResourceSchema::new(rt("tickets")).with_id(IdPattern::Uuid),
        ]);
        MemoryStore::new(Arc::new(schemas))
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_splits_attributes_and_relationships() {
        let store = store();
        let post = store
            .create(
                &rt("posts"),
                Some(id("1")),
                &fields(json!({"title": "Hi", "tags": [{"type": "tags", "id": "7"}]})),
            )
            .await
            .unwrap();

        assert_eq!(post.attributes["title"], json!("Hi"));
        assert!(post.relationships["tags"].is_to_many());
        assert_eq!(store.find(&rt("posts"), &id("1")).await.unwrap(), Some(post));
        assert!(store.create(&rt("posts"), Some(id("1")), &Map::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let store = store();
        let a = store.create(&rt("tags"), None, &Map::new()).await.unwrap();
        let b = store.create(&rt("tags"), None, &Map::new()).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(&rt("tags")), 2);
    }

    #[tokio::test]
    async fn test_query_all_filters() {
        let store = store();
        for (key, name) in [("1", "rust"), ("2", "go"), ("3", "rust")] {
            store
                .create(&rt("tags"), Some(id(key)), &fields(json!({"name": name})))
                .await
                .unwrap();
        }

        let query: QueryParams =
            serde_json::from_value(json!({"filter": {"name": "rust"}})).unwrap();
        let found: Vec<_> = store
            .query_all(&rt("tags"), &query)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(found, vec!["1", "3"]);

        let query: QueryParams = serde_json::from_value(json!({"filter": {"id": "2,3"}})).unwrap();
        assert_eq!(store.query_all(&rt("tags"), &query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_to_many_modes() {
        let store = store();
        for key in ["1", "2", "3"] {
            store.create(&rt("tags"), Some(id(key)), &Map::new()).await.unwrap();
        }
        let post = store.create(&rt("posts"), Some(id("p")), &Map::new()).await.unwrap();
        let tag = |key: &str| ResourceIdentifier::new(rt("tags"), id(key));

        let ids = |models: Vec<Model>| {
            models.into_iter().map(|m| m.id.to_string()).collect::<Vec<_>>()
        };

        let replaced = store
            .modify_to_many(&post, "tags", ToManyMode::Replace, &[tag("1")])
            .await
            .unwrap();
        assert_eq!(ids(replaced), vec!["1"]);

        let attached = store
            .modify_to_many(&post, "tags", ToManyMode::Attach, &[tag("1"), tag("2"), tag("3")])
            .await
            .unwrap();
        assert_eq!(ids(attached), vec!["1", "2", "3"]);

        let detached = store
            .modify_to_many(&post, "tags", ToManyMode::Detach, &[tag("2")])
            .await
            .unwrap();
        assert_eq!(ids(detached), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_related_queries() {
        let store = store();
        store.create(&rt("users"), Some(id("u")), &Map::new()).await.unwrap();
        let post = store.create(&rt("posts"), Some(id("p")), &Map::new()).await.unwrap();

        assert_eq!(store.query_related(&post, "author").await.unwrap(), Data::Null);
        assert_eq!(store.query_related(&post, "tags").await.unwrap(), Data::Many(vec![]));

        let author = store
            .modify_to_one(&post, "author", Some(ResourceIdentifier::new(rt("users"), id("u"))))
            .await
            .unwrap();
        assert_eq!(author.map(|m| m.id), Some(id("u")));
        assert!(matches!(store.query_related(&post, "author").await.unwrap(), Data::One(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = store();
        let post = store
            .create(&rt("posts"), Some(id("p")), &fields(json!({"title": "a"})))
            .await
            .unwrap();

        let updated = store.update(&post, &fields(json!({"title": "b"}))).await.unwrap();
        assert_eq!(updated.attributes["title"], json!("b"));

        store.delete(&post).await.unwrap();
        assert!(store.find(&rt("posts"), &id("p")).await.unwrap().is_none());
        assert!(store.delete(&post).await.is_err());
    }

    #[tokio::test]
    async fn test_generated_ids_follow_the_id_pattern() {
        let store = store();
        let first = store.create(&rt("orders"), None, &Map::new()).await.unwrap();
        let second = store.create(&rt("orders"), None, &Map::new()).await.unwrap();
        assert_eq!((first.id, second.id), (id("1"), id("2")));

        store.create(&rt("orders"), Some(id("10")), &Map::new()).await.unwrap();
        let next = store.create(&rt("orders"), None, &Map::new()).await.unwrap();
        assert_eq!(next.id, id("11"));

        // Deleted ids are not handed out again
        store.delete(&next).await.unwrap();
        let after_delete = store.create(&rt("orders"), None, &Map::new()).await.unwrap();
        assert_eq!(after_delete.id, id("12"));

        let ticket = store.create(&rt("tickets"), None, &Map::new()).await.unwrap();
        assert!(IdPattern::Uuid.matches(ticket.id.as_str()));
    }

    #[tokio::test]
    async fn test_rollback_restores_touched_rows() {
        let store = store();
        let tag = store
            .create(&rt("tags"), Some(id("1")), &fields(json!({"name": "kept"})))
            .await
            .unwrap();
        let post = store.create(&rt("posts"), Some(id("p")), &Map::new()).await.unwrap();

        store.begin().await.unwrap();
        store.update(&tag, &fields(json!({"name": "changed"}))).await.unwrap();
        store.create(&rt("tags"), Some(id("2")), &Map::new()).await.unwrap();
        store
            .modify_to_many(
                &post,
                "tags",
                ToManyMode::Attach,
                &[ResourceIdentifier::new(rt("tags"), id("1"))],
            )
            .await
            .unwrap();
        store.delete(&post).await.unwrap();
        store.rollback().await.unwrap();

        let tag = store.find(&rt("tags"), &id("1")).await.unwrap().unwrap();
        assert_eq!(tag.attributes["name"], json!("kept"));
        assert_eq!(store.len(&rt("tags")), 1);
        let post = store.find(&rt("posts"), &id("p")).await.unwrap().unwrap();
        assert!(post.relationships.get("tags").is_none());

        store.begin().await.unwrap();
        store.create(&rt("tags"), Some(id("3")), &Map::new()).await.unwrap();
        store.commit().await.unwrap();
        assert_eq!(store.len(&rt("tags")), 2);

        assert!(store.commit().await.is_err());
        assert!(store.rollback().await.is_err());
    }

    #[tokio::test]
    async fn test_transactions_are_serialised() {
        let store = Arc::new(store());
        store.begin().await.unwrap();

        let waiting = {
            let store = store.clone();
            tokio::spawn(async move {
                store.begin().await.unwrap();
                let seen = store.len(&rt("tags"));
                store.commit().await.unwrap();
                seen
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());

        store.create(&rt("tags"), None, &Map::new()).await.unwrap();
        store.commit().await.unwrap();
        assert_eq!(waiting.await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_attaches_all_land() {
        for _ in 0..20 {
            let store = Arc::new(store());
            let post = store.create(&rt("posts"), Some(id("p")), &Map::new()).await.unwrap();

            let tasks: Vec<_> = (0..64)
                .map(|n| {
                    let store = store.clone();
                    let post = post.clone();
                    tokio::spawn(async move {
                        let tag = ResourceIdentifier::new(rt("tags"), id(&n.to_string()));
                        store
                            .modify_to_many(&post, "tags", ToManyMode::Attach, &[tag])
                            .await
                            .unwrap();
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            let stored = store.find(&rt("posts"), &id("p")).await.unwrap().unwrap();
            assert_eq!(stored.relationships["tags"].identifiers().len(), 64);
        }
    }
}
