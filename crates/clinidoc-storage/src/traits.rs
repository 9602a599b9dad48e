//! Storage traits all Clinidoc backends must implement.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::query::{Query, QueryFilter, QueryResult};
use crate::types::{EntityKind, StoredEntity};

/// The persistence contract consumed by the orchestrator.
///
/// Implementations must be thread-safe (`Send + Sync`). `replace` is a
/// compare-and-swap keyed on the stored version: mutations on the same
/// entity id are linearizable, a losing concurrent writer gets
/// `StorageError::VersionConflict` and must retry with fresh state.
///
/// # Example
///
/// ```ignore
/// use clinidoc_storage::{ChartStore, EntityKind, StorageError, StoredEntity};
///
/// async fn get_encounter(
///     store: &dyn ChartStore,
///     id: &str,
/// ) -> Result<StoredEntity, StorageError> {
///     store
///         .get(EntityKind::Encounter, id)
///         .await?
///         .ok_or_else(|| StorageError::not_found("encounter", id))
/// }
/// ```
#[async_trait]
pub trait ChartStore: Send + Sync {
    /// Reads an entity by kind and id. `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing
    /// entities.
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<StoredEntity>, StorageError>;

    /// Creates a new entity at version 1.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if an entity with the same
    /// kind and id exists.
    async fn create(
        &self,
        kind: EntityKind,
        id: &str,
        body: Value,
    ) -> Result<StoredEntity, StorageError>;

    /// Replaces an entity body, guarded by the expected stored version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the entity does not exist.
    /// Returns `StorageError::VersionConflict` if `expected_version` does
    /// not match the stored version.
    async fn replace(
        &self,
        kind: EntityKind,
        id: &str,
        body: Value,
        expected_version: u64,
    ) -> Result<StoredEntity, StorageError>;

    /// Deletes an entity by kind and id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the entity does not exist.
    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), StorageError>;

    /// Runs a filtered, paginated, optionally sorted query.
    async fn query(&self, query: &Query) -> Result<QueryResult, StorageError>;

    /// Counts entities of a kind matching the filters.
    async fn count(
        &self,
        kind: EntityKind,
        filters: &[QueryFilter],
    ) -> Result<usize, StorageError>;

    /// Begins a transaction scope for all-or-nothing bulk writes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Transaction` if a transaction cannot be
    /// started.
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StorageError>;

    /// The name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// A transaction scope for atomic bulk writes.
///
/// Writes are applied eagerly and undone on `rollback` via snapshots taken
/// before each write; `commit` discards the snapshots. The transaction must
/// be either committed or rolled back.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Commits all writes in this transaction.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Undoes all writes in this transaction, newest first.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;

    /// Creates an entity within this transaction.
    async fn create(
        &mut self,
        kind: EntityKind,
        id: &str,
        body: Value,
    ) -> Result<StoredEntity, StorageError>;

    /// Replaces an entity within this transaction, version-guarded.
    async fn replace(
        &mut self,
        kind: EntityKind,
        id: &str,
        body: Value,
        expected_version: u64,
    ) -> Result<StoredEntity, StorageError>;

    /// Deletes an entity within this transaction.
    async fn delete(&mut self, kind: EntityKind, id: &str) -> Result<(), StorageError>;

    /// Reads an entity, seeing this transaction's uncommitted writes.
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<StoredEntity>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that ChartStore is object-safe
    fn _assert_store_object_safe(_: &dyn ChartStore) {}

    // Compile-time test that StoreTransaction is object-safe
    fn _assert_transaction_object_safe(_: &dyn StoreTransaction) {}
}
