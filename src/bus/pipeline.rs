//! A small middleware engine: an ordered stack of `Middleware` in front of a
//! terminal `Destination`.
//!
//! ```text
//! message → mw[0] → mw[1] → ... → destination
//! ```
//!
//! Each middleware decides whether to call `next` (possibly with a modified
//! copy of the message) or to answer on its own.

use async_trait::async_trait;

use crate::model::Outcome;

/// Expected negative outcomes are `Ok(Outcome::Failed(..))`; `Err` is kept
/// for genuinely exceptional conditions.
pub type Handled = anyhow::Result<Outcome>;

#[async_trait]
pub trait Middleware<M: Send + 'static>: Send + Sync {
    async fn handle(&self, message: M, next: Next<'_, M>) -> Handled;
}

/// The terminal handler that actually executes a message.
#[async_trait]
pub trait Destination<M: Send + 'static>: Send + Sync {
    async fn execute(&self, message: M) -> Handled;
}

/// The remainder of the chain, as seen from inside one middleware.
pub struct Next<'a, M: Send + 'static> {
    stack: &'a [Box<dyn Middleware<M>>],
    destination: &'a dyn Destination<M>,
}

impl<'a, M: Send + 'static> Next<'a, M> {
    pub async fn run(self, message: M) -> Handled {
        match self.stack.split_first() {
            Some((head, rest)) => {
                head.handle(
                    message,
                    Next {
                        stack: rest,
                        destination: self.destination,
                    },
                )
                .await
            }
            None => self.destination.execute(message).await,
        }
    }
}

pub struct Pipeline<M: Send + 'static> {
    stack: Vec<Box<dyn Middleware<M>>>,
}

impl<M: Send + 'static> Pipeline<M> {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn through(mut self, middleware: impl Middleware<M> + 'static) -> Self {
        self.stack.push(Box::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub async fn send(&self, message: M, destination: &dyn Destination<M>) -> Handled {
        Next {
            stack: &self.stack,
            destination,
        }
        .run(message)
        .await
    }
}

impl<M: Send + 'static> Default for Pipeline<M> {
    fn default() -> Self {
        Self::new()
    }
}
