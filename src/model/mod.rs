pub mod common;
pub mod context;
pub mod document;
pub mod identifier;
pub mod outcome;
pub mod record;
pub mod resource;

pub use common::*;
pub use context::*;
pub use document::*;
pub use identifier::*;
pub use outcome::*;
pub use record::*;
pub use resource::*;
