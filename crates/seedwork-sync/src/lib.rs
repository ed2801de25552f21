//! # seedwork-sync
//!
//! Startup reconciliation of a template directory (schema plus baseline data)
//! into a content backend.
//!
//! A run passes through three stages:
//! 1. [`gate`]: the template root must be a writable directory, otherwise the
//!    run is skipped.
//! 2. Schema: either the [`collections`] resolver followed by the [`fields`]
//!    synchronizer, or a single external [`snapshot`] apply.
//! 3. [`data`]: one import per data kind in a fixed order, each payload passed
//!    through the [`sanitize`] rules first.
//!
//! Only the gate can end a run early. Every other failure is reported through
//! the [`DiagnosticSink`] and the run moves on.

pub mod collections;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod fields;
pub mod gate;
pub mod observability;
pub mod run;
pub mod sanitize;
pub mod snapshot;
pub mod template;

pub use collections::{ExcuseReason, Excused, ResolveReport, resolve_collections};
pub use config::{AppConfig, BackendKind, SchemaMode};
pub use data::{DataImporter, KindOutcome, import_data, import_kind};
pub use diagnostics::{DiagnosticSink, RecordingSink, TracingSink};
pub use error::{FailureKind, SyncError};
pub use fields::{MemberSyncReport, sync_field, sync_fields, sync_relation, sync_relations};
pub use gate::{TemplateRoot, check_template_root};
pub use run::{RunReport, SchemaOutcome, Stage, SyncSettings, TemplateSync, plan};
pub use sanitize::{DisplacedRoles, Sanitizer};
pub use snapshot::{CommandApplier, SnapshotApplier, apply_snapshot};
pub use template::{DataKind, Payload, SchemaTemplate, Shape, TemplateSet};
