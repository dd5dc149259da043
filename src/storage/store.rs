use async_trait::async_trait;

use crate::storage::error::StoreError;
use crate::storage::models::Entity;

/// Read side of a migration: a table whose rows can be listed
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Every entity in the table, in service order
    async fn list_entities(&self) -> Result<Vec<Entity>, StoreError>;
}

/// Write side of a migration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Upsert all entities atomically. Entities must share one partition key.
    /// A rejected transaction is reported as `StoreError::Transaction`.
    async fn submit_transaction(&self, entities: &[Entity]) -> Result<(), StoreError>;

    /// Insert-or-replace a single entity
    async fn upsert_entity(&self, entity: &Entity) -> Result<(), StoreError>;
}
