//! One reconciliation run: gate, schema stage, data stage.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use seedwork_storage::{CollectionInfo, DynBackend};

use crate::collections::{ResolveReport, resolve_collections};
use crate::config::{AppConfig, SchemaMode};
use crate::data::{DataImporter, KindOutcome};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::SyncError;
use crate::fields::{MemberSyncReport, sync_fields, sync_relations};
use crate::gate::{TemplateRoot, check_template_root};
use crate::snapshot::{CommandApplier, SnapshotApplier, apply_snapshot};
use crate::template::{DataKind, Payload, SchemaTemplate, TemplateSet};

pub const GATE_SKIP_MESSAGE: &str = "Template directory could not be read. Skipping import";

/// One step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Schema,
    Data(DataKind),
}

/// The ordered task list of a run. Each stage completes before the next starts.
pub fn plan() -> Vec<Stage> {
    std::iter::once(Stage::Schema)
        .chain(DataKind::ORDER.into_iter().map(Stage::Data))
        .collect()
}

/// Where the template lives and how its schema is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub root: PathBuf,
    pub collections_file: String,
    pub snapshot_file: String,
    pub mode: SchemaMode,
}

impl SyncSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            collections_file: "collections.json".into(),
            snapshot_file: "snapshot.yaml".into(),
            mode: SchemaMode::Objects,
        }
    }

    pub fn with_mode(mut self, mode: SchemaMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            root: cfg.template.root.clone(),
            collections_file: cfg.template.collections_file.clone(),
            snapshot_file: cfg.template.snapshot_file.clone(),
            mode: cfg.schema.mode,
        }
    }
}

/// Outcome of the schema stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOutcome {
    Objects {
        collections: ResolveReport,
        fields: MemberSyncReport,
        relations: MemberSyncReport,
    },
    Snapshot {
        output: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// `false` when the template root was unusable and nothing ran.
    pub gate_passed: bool,
    pub schema: Option<SchemaOutcome>,
    /// One outcome per data kind, in import order.
    pub kinds: Vec<(DataKind, KindOutcome)>,
}

impl RunReport {
    fn skipped() -> Self {
        Self::default()
    }

    pub fn outcome(&self, kind: DataKind) -> Option<&KindOutcome> {
        self.kinds
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    /// Data records created across all kinds.
    pub fn records_created(&self) -> usize {
        self.kinds
            .iter()
            .map(|(_, outcome)| outcome.created())
            .sum()
    }

    /// Units that failed, schema stage included.
    pub fn failures(&self) -> usize {
        let schema = match &self.schema {
            Some(SchemaOutcome::Failed { .. }) => 1,
            Some(SchemaOutcome::Objects {
                collections,
                fields,
                relations,
            }) => collections.failed.len() + fields.failed + relations.failed,
            _ => 0,
        };
        schema + self.kinds.iter().filter(|(_, o)| o.is_failed()).count()
    }
}

/// Reconciles a template directory into a backend.
///
/// # Example
///
/// ```ignore
/// let report = TemplateSync::new(backend, SyncSettings::new("/directus/templates"))
///     .run()
///     .await;
/// assert!(report.gate_passed);
/// ```
pub struct TemplateSync {
    backend: DynBackend,
    settings: SyncSettings,
    sink: Arc<dyn DiagnosticSink>,
    applier: Arc<dyn SnapshotApplier>,
}

impl TemplateSync {
    pub fn new(backend: DynBackend, settings: SyncSettings) -> Self {
        Self {
            backend,
            settings,
            sink: Arc::new(TracingSink::default()),
            applier: Arc::new(CommandApplier::default()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_applier(mut self, applier: Arc<dyn SnapshotApplier>) -> Self {
        self.applier = applier;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Runs once. Never fails: every error is reported and folded into the report.
    pub async fn run(&self) -> RunReport {
        self.sink.open();
        let report = self.reconcile().await;
        self.sink.close();

        tracing::info!(
            backend = self.backend.backend_name(),
            gate_passed = report.gate_passed,
            records_created = report.records_created(),
            failures = report.failures(),
            "template sync finished"
        );
        report
    }

    async fn reconcile(&self) -> RunReport {
        let sink = self.sink.as_ref();

        let root = match check_template_root(&self.settings.root).await {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(error = %e, "template gate failed");
                sink.emit(GATE_SKIP_MESSAGE);
                return RunReport::skipped();
            }
        };

        let schema_file = match self.settings.mode {
            SchemaMode::Objects => Some(self.settings.collections_file.as_str()),
            SchemaMode::Snapshot => None,
        };
        let TemplateSet {
            schema: mut loaded_schema,
            data,
        } = TemplateSet::load(&root, schema_file).await;
        let mut loaded_data: HashMap<DataKind, Result<Payload, SyncError>> =
            data.into_iter().collect();

        let mut report = RunReport {
            gate_passed: true,
            ..RunReport::default()
        };
        let mut importer = DataImporter::new(self.backend.as_ref(), sink);

        for stage in plan() {
            tracing::debug!(?stage, "stage started");
            match stage {
                Stage::Schema => {
                    let outcome = match (self.settings.mode, loaded_schema.take()) {
                        (SchemaMode::Snapshot, _) => self.apply_snapshot_schema(&root).await,
                        (SchemaMode::Objects, Some(loaded)) => {
                            self.sync_schema_objects(loaded).await
                        }
                        (SchemaMode::Objects, None) => SchemaOutcome::Failed {
                            reason: "schema template was not loaded".into(),
                        },
                    };
                    report.schema = Some(outcome);
                }
                Stage::Data(kind) => {
                    if let Some(loaded) = loaded_data.remove(&kind) {
                        let outcome = importer.import(kind, loaded).await;
                        report.kinds.push((kind, outcome));
                    }
                }
            }
        }

        report
    }

    async fn sync_schema_objects(
        &self,
        loaded: Result<SchemaTemplate, SyncError>,
    ) -> SchemaOutcome {
        let sink = self.sink.as_ref();
        let backend = self.backend.as_ref();

        let template = match loaded {
            Ok(template) => template,
            Err(e) => {
                sink.emit(&format!("Could not import collections: {e}"));
                return SchemaOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let live_before = match backend.list_collections().await {
            Ok(live) => live,
            Err(e) => {
                let err = SyncError::apply("collection listing", e);
                sink.emit(&format!("Error: {err}"));
                Vec::new()
            }
        };

        let collections =
            resolve_collections(backend, &template.collections, &live_before, sink).await;

        let live = match backend.list_collections().await {
            Ok(live) => names(&live),
            Err(e) => {
                tracing::warn!(error = %e, "live collection refresh failed, using pre-run listing");
                let mut live = names(&live_before);
                live.extend(collections.applied.iter().cloned());
                live
            }
        };

        let fields = sync_fields(backend, &template.fields, &live, sink).await;
        let relations = sync_relations(backend, &template.relations, &live, sink).await;
        sink.emit("Collections synced");

        SchemaOutcome::Objects {
            collections,
            fields,
            relations,
        }
    }

    async fn apply_snapshot_schema(&self, root: &TemplateRoot) -> SchemaOutcome {
        let path = root.file(&self.settings.snapshot_file);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let err = SyncError::load(
                &self.settings.snapshot_file,
                format!("{} does not exist", path.display()),
            );
            self.sink.emit(&format!("Could not apply snapshot: {err}"));
            return SchemaOutcome::Failed {
                reason: err.to_string(),
            };
        }

        match apply_snapshot(self.applier.as_ref(), &path, self.sink.as_ref()).await {
            Ok(output) => SchemaOutcome::Snapshot { output },
            Err(e) => SchemaOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

fn names(live: &[CollectionInfo]) -> HashSet<String> {
    live.iter().map(|c| c.collection.clone()).collect()
}
