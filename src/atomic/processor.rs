use anyhow::anyhow;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;

use crate::atomic::lid::LidMap;
use crate::atomic::operations::{ListOfOperations, Operation};
use crate::atomic::parsers::ATOMIC_OPERATIONS;
use crate::atomic::results::{ListOfResults, Processed};
use crate::atomic::values::OpCode;
use crate::bus::{
    AttachRelationshipCommand, DestroyCommand, DetachRelationshipCommand, Dispatcher, Handled,
    Message, RelationshipUpdate, StoreCommand, UpdateCommand, UpdateRelationshipCommand,
};
use crate::model::{Outcome, Payload, QueryParams, RequestContext};
use crate::store::Store;

/// Executes atomic operations one after another through the bus.
///
/// Execution stops at the first operation that does not succeed, and error
/// pointers are rewritten to locate that operation in the request document.
/// A request runs inside one store transaction: it is committed only when
/// every operation succeeds and rolled back otherwise.
#[derive(Clone)]
pub struct Processor {
    dispatcher: Dispatcher,
}

impl Processor {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run a whole atomic request as one unit of work.
    pub async fn process(
        &self,
        context: &RequestContext,
        operations: ListOfOperations,
    ) -> anyhow::Result<Processed> {
        let processor = self.clone();
        let context = context.clone();
        self.transaction(
            async move { processor.run(&context, operations).await },
            |processed| matches!(processed, Processed::Succeeded(_)),
        )
        .await
    }

    /// Execute a single operation inside its own transaction.
    pub async fn execute_atomically(
        &self,
        context: &RequestContext,
        query: &QueryParams,
        operation: Operation,
    ) -> Handled {
        let processor = self.clone();
        let context = context.clone();
        let query = query.clone();
        self.transaction(
            async move { processor.execute(&context, &query, operation).await },
            |outcome| matches!(outcome, Outcome::Succeeded(_)),
        )
        .await
    }

    /// Run `work` inside a store transaction. Runs detached from the caller
    /// so a dropped request still ends its transaction.
    async fn transaction<T, F, C>(&self, work: F, commits: C) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        C: FnOnce(&T) -> bool + Send + 'static,
    {
        let store = self.dispatcher.services().store.clone();
        tokio::spawn(in_transaction(store, work, commits))
            .await
            .map_err(|err| anyhow!("Transaction task failed: {}", err))?
    }

    async fn run(
        &self,
        context: &RequestContext,
        operations: ListOfOperations,
    ) -> anyhow::Result<Processed> {
        let mut lids = LidMap::new();
        let mut results = Vec::with_capacity(operations.len());

        for (index, operation) in operations.into_iter().enumerate() {
            let location = format!("/{}/{}", ATOMIC_OPERATIONS, index);

            let operation = match lids.resolve(operation) {
                Ok(operation) => operation,
                Err(errors) => {
                    return Ok(Processed::Failed(errors.with_pointer_prefix(&location)))
                }
            };

            let declared = match &operation {
                Operation::Create(op) => {
                    op.data.lid.clone().map(|lid| (op.data.resource_type.clone(), lid))
                }
                _ => None,
            };
            let modifies_relationship = operation.is_modifying_relationship();

            debug!("Executing atomic operation {} ({})", index, operation.op());
            match self.execute(context, &QueryParams::new(), operation).await? {
                Outcome::Succeeded(payload) => {
                    if let (Some((resource_type, lid)), Some(model)) = (declared, payload.model()) {
                        lids.insert(resource_type, lid, model.id.clone());
                    }
                    results.push(if modifies_relationship {
                        Payload::none().with_meta(payload.meta)
                    } else {
                        payload
                    });
                }
                Outcome::Failed(errors) => {
                    info!("Atomic operation {} failed, stopping", index);
                    return Ok(Processed::Failed(errors.with_pointer_prefix(&location)));
                }
                Outcome::Halted(response) => return Ok(Processed::Halted(response)),
            }
        }

        Ok(Processed::Succeeded(ListOfResults::new(results)))
    }

    /// Dispatch the command matching a single operation.
    pub async fn execute(
        &self,
        context: &RequestContext,
        query: &QueryParams,
        operation: Operation,
    ) -> Handled {
        let context = context.clone();
        let query = query.clone();
        let dispatcher = &self.dispatcher;

        match operation {
            Operation::Create(op) => {
                let command = StoreCommand::new(context, op).with_query(query);
                dispatcher.dispatch(dispatcher.hooked(command)).await
            }
            Operation::Update(op) => {
                let command = UpdateCommand::new(context, op).with_query(query);
                dispatcher.dispatch(dispatcher.hooked(command)).await
            }
            Operation::Delete(op) => {
                let command = DestroyCommand::new(context, op).with_query(query);
                dispatcher.dispatch(dispatcher.hooked(command)).await
            }
            Operation::UpdateToOne(op) => {
                let update = RelationshipUpdate::ToOne(op);
                let command = UpdateRelationshipCommand::new(context, update).with_query(query);
                dispatcher.dispatch(dispatcher.hooked(command)).await
            }
            Operation::UpdateToMany(op) => match op.op {
                OpCode::Add => {
                    let command = AttachRelationshipCommand::new(context, op).with_query(query);
                    dispatcher.dispatch(dispatcher.hooked(command)).await
                }
                OpCode::Remove => {
                    let command = DetachRelationshipCommand::new(context, op).with_query(query);
                    dispatcher.dispatch(dispatcher.hooked(command)).await
                }
                OpCode::Update => {
                    let update = RelationshipUpdate::ToMany(op);
                    let command =
                        UpdateRelationshipCommand::new(context, update).with_query(query);
                    dispatcher.dispatch(dispatcher.hooked(command)).await
                }
            },
        }
    }
}

/// Bracket `work` with `begin` and `commit`, rolling back when it fails,
/// panics or does not pass `commits`.
async fn in_transaction<T, F, C>(store: Arc<dyn Store>, work: F, commits: C) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
    C: FnOnce(&T) -> bool,
{
    store.begin().await?;
    let result = match tokio::spawn(work).await {
        Ok(result) => result,
        Err(err) => Err(anyhow!("Atomic request aborted: {}", err)),
    };

    match result {
        Ok(value) if commits(&value) => {
            store.commit().await?;
            Ok(value)
        }
        Ok(value) => {
            debug!("Rolling back unsuccessful request");
            store.rollback().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = store.rollback().await {
                warn!("Rollback after '{}' failed: {}", err, rollback);
            }
            Err(err)
        }
    }
}
