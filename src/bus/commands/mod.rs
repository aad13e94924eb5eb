pub mod destroy;
pub mod relationship;
pub mod store;
pub mod update;

pub use destroy::{DestroyCommand, DestroyCommandHandler};
pub use relationship::{
    AttachRelationshipCommand, DetachRelationshipCommand, ModifyToManyHandler, RelationshipUpdate,
    UpdateRelationshipCommand, UpdateRelationshipCommandHandler,
};
pub use store::{StoreCommand, StoreCommandHandler};
pub use update::{UpdateCommand, UpdateCommandHandler};
