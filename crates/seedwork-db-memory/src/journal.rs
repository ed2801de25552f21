//! Call journal recorded by the in-memory backend.

use std::fmt;

/// A port operation, as recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListCollections,
    UpsertCollection,
    ReadField,
    CreateField,
    UpdateField,
    ReadRelation,
    CreateRelation,
    UpdateRelation,
    ReadItems,
    UpsertSingleton,
    UpsertMany,
}

impl Operation {
    /// Returns `true` for operations that create a new object.
    pub fn is_create(&self) -> bool {
        matches!(self, Self::CreateField | Self::CreateRelation)
    }

    /// Returns `true` for operations that modify backend state.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Self::ListCollections | Self::ReadField | Self::ReadRelation | Self::ReadItems
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListCollections => "list_collections",
            Self::UpsertCollection => "upsert_collection",
            Self::ReadField => "read_field",
            Self::CreateField => "create_field",
            Self::UpdateField => "update_field",
            Self::ReadRelation => "read_relation",
            Self::CreateRelation => "create_relation",
            Self::UpdateRelation => "update_relation",
            Self::ReadItems => "read_items",
            Self::UpsertSingleton => "upsert_singleton",
            Self::UpsertMany => "upsert_many",
        };
        f.write_str(name)
    }
}

/// One recorded call.
///
/// `target` is the collection name for collection and item operations and
/// `collection.field` for field and relation operations. `created` counts the
/// objects the call created (0 for reads and pure updates).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub operation: Operation,
    pub target: String,
    pub created: usize,
    pub succeeded: bool,
}

impl JournalEntry {
    pub fn new(operation: Operation, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
            created: 0,
            succeeded: true,
        }
    }
}

/// Summary of a journal, used for dry-run reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalSummary {
    pub calls: usize,
    pub writes: usize,
    pub created: usize,
    pub failed: usize,
}

impl JournalSummary {
    pub fn from_entries(entries: &[JournalEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, entry| {
            acc.calls += 1;
            if entry.operation.is_write() {
                acc.writes += 1;
            }
            acc.created += entry.created;
            if !entry.succeeded {
                acc.failed += 1;
            }
            acc
        })
    }
}
