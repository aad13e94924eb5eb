//! The command and query bus.
//!
//! Every message runs through its own middleware stack (model lookup,
//! authorization, validation, hooks) before reaching its handler.

pub mod commands;
pub mod dispatcher;
pub mod message;
pub mod middleware;
pub mod pipeline;
pub mod queries;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::*;
pub use dispatcher::{Dispatchable, Dispatcher, Services};
pub use message::{Authorize, Envelope, Hooked, Message, Validate};
pub use pipeline::{Destination, Handled, Middleware, Next, Pipeline};
pub use queries::*;
