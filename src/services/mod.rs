pub mod agent;
pub mod completion;
pub mod database;
pub mod export;
pub mod schema_cache;
pub mod sql;
pub mod storage;

pub use completion::{CompletionEngine, Suggestion, SuggestionKind};
pub use database::*;
pub use schema_cache::SchemaCache;
