//! In-memory content backend for seedwork.
//!
//! This crate provides an in-memory implementation of the `Backend` port from
//! `seedwork-storage`. It records every call in a journal and supports fault
//! injection, so it doubles as the test backend for the reconciliation engine
//! and as a rehearsal target for dry runs.
//!
//! # Example
//!
//! ```ignore
//! use seedwork_db_memory::InMemoryBackend;
//! use seedwork_storage::{CollectionDef, CollectionStore};
//!
//! let backend = InMemoryBackend::with_collections(["directus_users"]);
//! backend.upsert_collection(&CollectionDef::new("articles")).await?;
//! assert_eq!(backend.journal().await.len(), 1);
//! ```

mod backend_impl;
pub mod journal;
pub mod storage;

pub use journal::{JournalEntry, JournalSummary, Operation};
pub use storage::{InMemoryBackend, MemberKey};

/// Creates a new shareable in-memory backend.
pub fn create_backend() -> seedwork_storage::DynBackend {
    std::sync::Arc::new(InMemoryBackend::new())
}
