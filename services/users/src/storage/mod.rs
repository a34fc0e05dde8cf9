//! Persistence strategies for user records
//!
//! Both strategies implement [`UserStorage`]; the store facade only talks to
//! the trait, so the backend is chosen once at startup.

mod file;
mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::config::{BackendKind, StoreConfig};
use crate::error::StoreResult;
use crate::models::User;

pub use file::JsonFileStorage;
pub use sql::{SqlUserStorage, WriteMode};

/// Storage backend for user records
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Every stored record, in no particular order
    async fn load_all(&self) -> StoreResult<Vec<User>>;

    /// Exact-key lookup
    async fn get(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Persist a record with a fresh id
    async fn insert(&self, user: &User) -> StoreResult<()>;

    /// Overwrite the stored record with the same id.
    ///
    /// Returns false when no such record exists.
    async fn replace(&self, user: &User) -> StoreResult<bool>;

    /// Delete a record. Returns false when no such record exists.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Check that the backing store is reachable
    async fn health_check(&self) -> StoreResult<bool>;

    /// Release the backing resources
    async fn close(&self);
}

/// Open the storage backend selected by the configuration
pub async fn open(config: &StoreConfig) -> StoreResult<Arc<dyn UserStorage>> {
    let storage: Arc<dyn UserStorage> = match config.backend {
        BackendKind::Sql => {
            info!(write_mode = ?config.write_mode, "Opening relational user storage");
            Arc::new(SqlUserStorage::connect(&config.database, config.write_mode).await?)
        }
        BackendKind::File => {
            info!(path = %config.file_path.display(), "Opening file user storage");
            Arc::new(JsonFileStorage::open(&config.file_path).await?)
        }
    };
    Ok(storage)
}
