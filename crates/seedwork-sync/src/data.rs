//! Data import: baseline records per data kind, in dependency order.

use std::fmt;

use seedwork_storage::{ItemQuery, ItemStore, StorageError, WriteOutcome, record_id};

use crate::diagnostics::DiagnosticSink;
use crate::error::SyncError;
use crate::sanitize::{ADMIN_ACCESS, Sanitizer};
use crate::template::{DataKind, Payload};

/// Result of importing one data kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindOutcome {
    Imported { created: usize, updated: usize },
    /// Some records of a batch were written, the rest failed.
    Partial {
        created: usize,
        updated: usize,
        failed: usize,
        reason: String,
    },
    Skipped { reason: String },
    Failed { reason: String },
}

impl KindOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Imported { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Partial { .. })
    }

    /// Records created, including those of a partially applied batch.
    pub fn created(&self) -> usize {
        match self {
            Self::Imported { created, .. } | Self::Partial { created, .. } => *created,
            _ => 0,
        }
    }
}

impl fmt::Display for KindOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imported { created, updated } => {
                write!(f, "imported ({created} created, {updated} updated)")
            }
            Self::Partial {
                created,
                updated,
                failed,
                reason,
            } => write!(
                f,
                "partially imported ({created} created, {updated} updated, {failed} failed): {reason}"
            ),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Reads the ids of the admin roles that already exist in the backend.
pub async fn live_admin_ids<S>(store: &S) -> Result<Vec<String>, SyncError>
where
    S: ItemStore + ?Sized,
{
    let collection = DataKind::Roles.collection();
    let query = ItemQuery::new().with_filter(ADMIN_ACCESS, true);
    let roles = store
        .read_items(&collection, &query)
        .await
        .map_err(|e| SyncError::apply(format!("admin lookup on {collection}"), e))?;
    Ok(roles.iter().filter_map(record_id).collect())
}

/// Imports one kind's loaded payload.
///
/// Every failure is reported through `sink` and folded into the outcome.
pub async fn import_kind<S>(
    store: &S,
    kind: DataKind,
    loaded: Result<Payload, SyncError>,
    sanitizer: &mut Sanitizer,
    sink: &dyn DiagnosticSink,
) -> KindOutcome
where
    S: ItemStore + ?Sized,
{
    let payload = match loaded {
        Ok(payload) => payload,
        Err(e) if e.is_empty_unit() => {
            sink.emit(&format!("{kind} seems empty"));
            return KindOutcome::Skipped {
                reason: e.to_string(),
            };
        }
        Err(e) => {
            sink.emit(&format!("Could not import {kind}: {e}"));
            return KindOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    if payload.is_empty() {
        sink.emit(&format!("{kind} seems empty"));
        return KindOutcome::Skipped {
            reason: "no records".to_string(),
        };
    }

    let sanitized = sanitizer.apply(kind, payload);
    if sanitized.dropped > 0 {
        tracing::info!(kind = %kind, dropped = sanitized.dropped, "records withheld by sanitization");
    }
    if sanitized.payload.is_empty() {
        sink.emit(&format!("{kind} has nothing left to import"));
        return KindOutcome::Skipped {
            reason: format!("{} record(s) withheld", sanitized.dropped),
        };
    }

    let collection = kind.collection();
    let written = match &sanitized.payload {
        Payload::Singleton(record) => store
            .upsert_singleton(&collection, &serde_json::Value::Object(record.clone()))
            .await
            .map(|outcome| match outcome {
                WriteOutcome::Created => (1, 0),
                WriteOutcome::Updated => (0, 1),
            }),
        Payload::Batch(records) => store
            .upsert_many(&collection, records)
            .await
            .map(|batch| (batch.created, batch.updated)),
    };

    match written {
        Ok((created, updated)) => {
            tracing::debug!(
                kind = %kind,
                shape = ?sanitized.payload.shape(),
                created,
                updated,
                "kind imported"
            );
            sink.emit(&format!("{kind} imported!"));
            KindOutcome::Imported { created, updated }
        }
        Err(StorageError::PartialBatch {
            created,
            updated,
            failed,
            first,
        }) => {
            tracing::warn!(
                kind = %kind,
                category = %first.category(),
                created,
                updated,
                failed,
                error = %first,
                "kind partially imported"
            );
            sink.emit(&format!(
                "Could not import {failed} {kind} record(s): {first}"
            ));
            KindOutcome::Partial {
                created,
                updated,
                failed,
                reason: first.to_string(),
            }
        }
        Err(e) => {
            let category = e.category();
            let err = SyncError::apply(collection, e);
            tracing::warn!(kind = %kind, %category, error = %err, "kind import failed");
            sink.emit(&format!("Could not import {kind}: {err}"));
            KindOutcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}

/// Imports data kinds one at a time, carrying sanitization state between them.
pub struct DataImporter<'a, S: ItemStore + ?Sized> {
    store: &'a S,
    sink: &'a dyn DiagnosticSink,
    sanitizer: Sanitizer,
    admins_checked: bool,
}

impl<'a, S: ItemStore + ?Sized> DataImporter<'a, S> {
    pub fn new(store: &'a S, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            store,
            sink,
            sanitizer: Sanitizer::new(),
            admins_checked: false,
        }
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Imports one kind. Roles trigger a one-time lookup of the live admin roles.
    pub async fn import(
        &mut self,
        kind: DataKind,
        loaded: Result<Payload, SyncError>,
    ) -> KindOutcome {
        if kind == DataKind::Roles && loaded.is_ok() && !self.admins_checked {
            self.protect_live_admins().await;
        }
        import_kind(self.store, kind, loaded, &mut self.sanitizer, self.sink).await
    }

    async fn protect_live_admins(&mut self) {
        self.admins_checked = true;
        match live_admin_ids(self.store).await {
            Ok(ids) => {
                tracing::debug!(count = ids.len(), "live admin roles protected");
                self.sanitizer = std::mem::take(&mut self.sanitizer).with_live_admins(ids);
            }
            Err(e) => {
                tracing::warn!(error = %e, "live admin lookup failed");
                self.sink.emit(&format!("Error: {e}"));
            }
        }
    }
}

/// Imports every loaded kind, strictly in sequence.
///
/// `data` is expected in [`DataKind::ORDER`]; it is imported in the order given.
pub async fn import_data<S>(
    store: &S,
    data: Vec<(DataKind, Result<Payload, SyncError>)>,
    sink: &dyn DiagnosticSink,
) -> Vec<(DataKind, KindOutcome)>
where
    S: ItemStore + ?Sized,
{
    let mut importer = DataImporter::new(store, sink);
    let mut outcomes = Vec::with_capacity(data.len());
    for (kind, loaded) in data {
        let outcome = importer.import(kind, loaded).await;
        outcomes.push((kind, outcome));
    }
    outcomes
}
