//! Collection dependency resolution.
//!
//! Collections may be nested under a parent group, which must exist before the
//! child can be applied. The resolver sweeps the pending collections until a
//! full pass makes no progress. A collection whose group exists neither in the
//! template nor in the backend is excused, as is any collection left pending at
//! the fixed point (only possible when groups form a cycle).

use std::collections::HashSet;

use indexmap::IndexSet;
use seedwork_storage::{CollectionDef, CollectionInfo, CollectionStore, WriteOutcome};

use crate::diagnostics::DiagnosticSink;
use crate::error::SyncError;

/// Collections handled so far in this run (applied, failed or excused).
#[derive(Debug, Default)]
pub struct ImportedSet {
    names: IndexSet<String>,
}

impl ImportedSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcuseReason {
    /// The group is neither in the template nor in the backend.
    MissingGroup,
    /// The group chain loops back on itself.
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excused {
    pub collection: String,
    pub group: String,
    pub reason: ExcuseReason,
}

/// Outcome of one resolver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Successfully applied collections, in application order.
    pub applied: Vec<String>,
    /// Collections whose apply call was rejected.
    pub failed: Vec<String>,
    pub excused: Vec<Excused>,
    /// Number of sweeps that made progress.
    pub passes: usize,
}

impl ResolveReport {
    /// Number of collections the resolver settled.
    pub fn settled(&self) -> usize {
        self.applied.len() + self.failed.len() + self.excused.len()
    }
}

enum Decision {
    Apply,
    Excuse,
    Defer,
}

fn decide(
    def: &CollectionDef,
    incoming: &HashSet<&str>,
    live: &HashSet<&str>,
    imported: &ImportedSet,
) -> Decision {
    match def.group() {
        None => Decision::Apply,
        Some(group) if imported.contains(group) || live.contains(group) => Decision::Apply,
        Some(group) if !incoming.contains(group) => Decision::Excuse,
        Some(_) => Decision::Defer,
    }
}

/// Applies `defs` in an order where every group precedes its children.
///
/// `live` is the backend's collection listing taken before the run.
pub async fn resolve_collections<S>(
    store: &S,
    defs: &[CollectionDef],
    live: &[CollectionInfo],
    sink: &dyn DiagnosticSink,
) -> ResolveReport
where
    S: CollectionStore + ?Sized,
{
    let incoming: HashSet<&str> = defs.iter().map(|d| d.collection.as_str()).collect();
    let live: HashSet<&str> = live.iter().map(|c| c.collection.as_str()).collect();
    let mut imported = ImportedSet::default();
    let mut report = ResolveReport::default();

    loop {
        let before = imported.len();

        for def in defs {
            if imported.contains(&def.collection) {
                continue;
            }
            match decide(def, &incoming, &live, &imported) {
                Decision::Defer => continue,
                Decision::Excuse => {
                    let group = def.group().unwrap_or_default().to_string();
                    sink.emit(&format!(
                        "Skipping collection {} because its group {group} does not exist",
                        def.collection
                    ));
                    report.excused.push(Excused {
                        collection: def.collection.clone(),
                        group,
                        reason: ExcuseReason::MissingGroup,
                    });
                }
                Decision::Apply => match store.upsert_collection(def).await {
                    Ok(outcome) => {
                        let verb = match outcome {
                            WriteOutcome::Created => "Created",
                            WriteOutcome::Updated => "Updated",
                        };
                        sink.emit(&format!("{verb} collection {}", def.collection));
                        report.applied.push(def.collection.clone());
                    }
                    Err(e) => {
                        let category = e.category();
                        let err = SyncError::apply(format!("collection {}", def.collection), e);
                        tracing::warn!(collection = %def.collection, %category, error = %err, "collection apply failed");
                        sink.emit(&format!("Error: {err}"));
                        report.failed.push(def.collection.clone());
                    }
                },
            }
            // No retries: a failed apply still counts as handled.
            imported.insert(&def.collection);
        }

        if imported.len() == before {
            break;
        }
        report.passes += 1;
    }

    for def in defs {
        if imported.contains(&def.collection) {
            continue;
        }
        let group = def.group().unwrap_or_default().to_string();
        sink.emit(&format!(
            "Skipping collection {} because its group {group} is part of a dependency cycle",
            def.collection
        ));
        report.excused.push(Excused {
            collection: def.collection.clone(),
            group,
            reason: ExcuseReason::Cycle,
        });
        imported.insert(&def.collection);
    }

    tracing::debug!(
        applied = report.applied.len(),
        failed = report.failed.len(),
        excused = report.excused.len(),
        passes = report.passes,
        "collections resolved"
    );

    report
}
