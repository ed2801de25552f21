//! Field and relation synchronization.
//!
//! Each definition is looked up by identity and then created or updated. Only
//! definitions whose owning collection exists in the backend are processed;
//! the rest are dropped without a diagnostic.

use std::collections::HashSet;

use seedwork_storage::{FieldDef, FieldStore, RelationDef, RelationStore, WriteOutcome};

use crate::diagnostics::DiagnosticSink;
use crate::error::SyncError;

/// Counts for one batch of field or relation definitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberSyncReport {
    pub created: usize,
    pub updated: usize,
    /// Definitions skipped because their collection does not exist.
    pub dropped: usize,
    pub failed: usize,
}

impl MemberSyncReport {
    fn record(&mut self, outcome: &Result<WriteOutcome, SyncError>) {
        match outcome {
            Ok(WriteOutcome::Created) => self.created += 1,
            Ok(WriteOutcome::Updated) => self.updated += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Creates the field if it does not exist, otherwise updates it.
pub async fn sync_field<S>(store: &S, def: &FieldDef) -> Result<WriteOutcome, SyncError>
where
    S: FieldStore + ?Sized,
{
    let target = format!("field {}", def.key());
    let existing = store
        .read_field(&def.collection, &def.field)
        .await
        .map_err(|e| SyncError::apply(&target, e))?;

    if existing.is_some() {
        store
            .update_field(def)
            .await
            .map_err(|e| SyncError::apply(&target, e))?;
        Ok(WriteOutcome::Updated)
    } else {
        store
            .create_field(def)
            .await
            .map_err(|e| SyncError::apply(&target, e))?;
        Ok(WriteOutcome::Created)
    }
}

/// Creates the relation if it does not exist, otherwise updates it.
pub async fn sync_relation<S>(store: &S, def: &RelationDef) -> Result<WriteOutcome, SyncError>
where
    S: RelationStore + ?Sized,
{
    let target = format!("relation {}", def.key());
    let existing = store
        .read_relation(&def.collection, &def.field)
        .await
        .map_err(|e| SyncError::apply(&target, e))?;

    if existing.is_some() {
        store
            .update_relation(def)
            .await
            .map_err(|e| SyncError::apply(&target, e))?;
        Ok(WriteOutcome::Updated)
    } else {
        store
            .create_relation(def)
            .await
            .map_err(|e| SyncError::apply(&target, e))?;
        Ok(WriteOutcome::Created)
    }
}

pub async fn sync_fields<S>(
    store: &S,
    fields: &[FieldDef],
    live: &HashSet<String>,
    sink: &dyn DiagnosticSink,
) -> MemberSyncReport
where
    S: FieldStore + ?Sized,
{
    let mut report = MemberSyncReport::default();
    for field in fields {
        if !live.contains(&field.collection) {
            tracing::debug!(field = %field.key(), "dropping field of unresolved collection");
            report.dropped += 1;
            continue;
        }
        let outcome = sync_field(store, field).await;
        match &outcome {
            Ok(WriteOutcome::Created) => sink.emit(&format!("Field {} created", field.key())),
            Ok(WriteOutcome::Updated) => sink.emit(&format!("Field {} updated", field.key())),
            Err(e) => {
                tracing::warn!(field = %field.key(), category = ?e.category(), error = %e, "field sync failed");
                sink.emit(&format!("Error: {e}"))
            }
        }
        report.record(&outcome);
    }
    report
}

pub async fn sync_relations<S>(
    store: &S,
    relations: &[RelationDef],
    live: &HashSet<String>,
    sink: &dyn DiagnosticSink,
) -> MemberSyncReport
where
    S: RelationStore + ?Sized,
{
    let mut report = MemberSyncReport::default();
    for relation in relations {
        if !live.contains(&relation.collection) {
            tracing::debug!(relation = %relation.key(), "dropping relation of unresolved collection");
            report.dropped += 1;
            continue;
        }
        let outcome = sync_relation(store, relation).await;
        match &outcome {
            Ok(WriteOutcome::Created) => {
                sink.emit(&format!("Created relation {}", relation.key()))
            }
            Ok(WriteOutcome::Updated) => {
                sink.emit(&format!("Updated relation {}", relation.key()))
            }
            Err(e) => {
                tracing::warn!(relation = %relation.key(), category = ?e.category(), error = %e, "relation sync failed");
                sink.emit(&format!("Error: {e}"))
            }
        }
        report.record(&outcome);
    }
    report
}
