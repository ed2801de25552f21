//! # seedwork-storage
//!
//! Port layer between the seedwork reconciliation engine and a content backend.
//!
//! This crate defines the traits and types a backend must provide. It does not
//! contain any implementations; those live in separate crates
//! (`seedwork-db-memory`, `seedwork-client`).
//!
//! ## Overview
//!
//! The capability set is split per object kind:
//! - [`CollectionStore`]: list-all, create-or-update-one
//! - [`FieldStore`]: read-one, create, update
//! - [`RelationStore`]: read-one, create, update
//! - [`ItemStore`]: read-by-query, upsert-singleton, upsert-many
//!
//! [`Backend`] bundles all four so a single handle can be injected.
//!
//! ## Example
//!
//! ```ignore
//! use seedwork_storage::{Backend, CollectionDef, StorageError};
//!
//! async fn ensure_collection(backend: &dyn Backend, name: &str) -> Result<(), StorageError> {
//!     backend.upsert_collection(&CollectionDef::new(name)).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{Backend, CollectionStore, FieldStore, ItemStore, RelationStore};
pub use types::{
    BatchOutcome, CollectionDef, CollectionInfo, FieldDef, ItemQuery, RelationDef, WriteOutcome,
    record_id,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared backend trait object.
pub type DynBackend = std::sync::Arc<dyn Backend>;
