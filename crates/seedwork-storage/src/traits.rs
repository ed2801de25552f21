//! Port traits for the content backend.
//!
//! These are the only operations the reconciliation engine needs from a host.
//! Implementations must be thread-safe (`Send + Sync`).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{
    BatchOutcome, CollectionDef, CollectionInfo, FieldDef, ItemQuery, RelationDef, WriteOutcome,
};

/// Collection operations.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Lists every collection that currently exists in the backend.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, StorageError>;

    /// Creates the collection if it does not exist, otherwise updates it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Rejected` if the backend refuses the definition,
    /// for example because its group does not exist.
    async fn upsert_collection(&self, def: &CollectionDef) -> Result<WriteOutcome, StorageError>;
}

/// Field operations.
#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Reads a field by `(collection, field)`.
    ///
    /// Returns `None` if the field does not exist.
    async fn read_field(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<FieldDef>, StorageError>;

    /// Creates a new field.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the field exists.
    async fn create_field(&self, def: &FieldDef) -> Result<(), StorageError>;

    /// Updates an existing field.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the field does not exist.
    async fn update_field(&self, def: &FieldDef) -> Result<(), StorageError>;
}

/// Relation operations.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Reads the relation attached to `(collection, field)`.
    async fn read_relation(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<RelationDef>, StorageError>;

    /// Creates a new relation.
    async fn create_relation(&self, def: &RelationDef) -> Result<(), StorageError>;

    /// Updates an existing relation.
    async fn update_relation(&self, def: &RelationDef) -> Result<(), StorageError>;
}

/// Item collection operations.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Reads the records of `collection` that match `query`.
    async fn read_items(
        &self,
        collection: &str,
        query: &ItemQuery,
    ) -> Result<Vec<Value>, StorageError>;

    /// Replaces the single record of a singleton collection.
    async fn upsert_singleton(
        &self,
        collection: &str,
        record: &Value,
    ) -> Result<WriteOutcome, StorageError>;

    /// Upserts each record independently, keyed by its `id`.
    ///
    /// Records without an `id` are always created. A failing record does not
    /// stop the rest; when any record fails the result is
    /// [`StorageError::PartialBatch`].
    async fn upsert_many(
        &self,
        collection: &str,
        records: &[Value],
    ) -> Result<BatchOutcome, StorageError>;
}

/// The full capability set a backend offers to the reconciliation engine.
pub trait Backend: CollectionStore + FieldStore + RelationStore + ItemStore {
    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}
