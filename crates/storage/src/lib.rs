#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod documents;
pub mod repository;
pub mod sqlite;

pub use catalog::{CatalogError, QuestionRepository, StaticCatalog};
pub use config::StorageConfig;
pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
