mod feeds;
mod migrate;
mod schema;
mod types;

pub use schema::Cache;
pub use types::{CacheError, FeedRecord, MigrationReport};
