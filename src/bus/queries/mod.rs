pub mod fetch_many;
pub mod fetch_one;
pub mod fetch_related;

pub use fetch_many::{FetchManyQuery, FetchManyQueryHandler};
pub use fetch_one::{FetchOneQuery, FetchOneQueryHandler};
pub use fetch_related::{FetchRelatedQuery, FetchRelatedQueryHandler, FetchRelationshipQuery};
