//! Template set: the on-disk description of schema and baseline data.
//!
//! Every unit (the schema file and one file per data kind) is read once at the
//! start of a run. A unit that cannot be loaded keeps its own [`SyncError`] so
//! the failure stays isolated to that unit.

use std::fmt;
use std::path::Path;

use seedwork_storage::{CollectionDef, FieldDef, RelationDef};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{EMPTY_UNIT, SyncError};
use crate::gate::TemplateRoot;

/// Data kinds, in the order they are imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Roles,
    Permissions,
    Dashboards,
    Flows,
    Operations,
    Panels,
    Translations,
    Settings,
}

impl DataKind {
    /// Import order. Roles precede permissions; dashboards precede panels.
    pub const ORDER: [DataKind; 8] = [
        DataKind::Roles,
        DataKind::Permissions,
        DataKind::Dashboards,
        DataKind::Flows,
        DataKind::Operations,
        DataKind::Panels,
        DataKind::Translations,
        DataKind::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::Permissions => "permissions",
            Self::Dashboards => "dashboards",
            Self::Flows => "flows",
            Self::Operations => "operations",
            Self::Panels => "panels",
            Self::Translations => "translations",
            Self::Settings => "settings",
        }
    }

    /// File holding this kind's records, relative to the template root.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Host collection the records are written to.
    pub fn collection(&self) -> String {
        format!("directus_{}", self.as_str())
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a data payload, decided by its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Singleton,
    Batch,
}

/// A parsed data file, classified once at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single JSON object: replaces the one record of the kind.
    Singleton(Map<String, Value>),
    /// A JSON array: each element is upserted independently.
    Batch(Vec<Value>),
}

impl Payload {
    /// Classifies a parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Load`] for scalars and `null`.
    pub fn classify(unit: &str, value: Value) -> Result<Self, SyncError> {
        match value {
            Value::Object(record) => Ok(Self::Singleton(record)),
            Value::Array(records) => Ok(Self::Batch(records)),
            other => Err(SyncError::load(
                unit,
                format!("unsupported payload shape: {}", json_type(&other)),
            )),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Singleton(_) => Shape::Singleton,
            Self::Batch(_) => Shape::Batch,
        }
    }

    /// Number of records the payload would write.
    pub fn record_count(&self) -> usize {
        match self {
            Self::Singleton(record) => usize::from(!record.is_empty()),
            Self::Batch(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Contents of the schema file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaTemplate {
    #[serde(default)]
    pub collections: Vec<CollectionDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

/// Everything a run reconciles, read once per run.
#[derive(Debug)]
pub struct TemplateSet {
    /// The schema unit; `None` when the schema is applied from a snapshot instead.
    pub schema: Option<Result<SchemaTemplate, SyncError>>,
    /// One unit per data kind, in import order.
    pub data: Vec<(DataKind, Result<Payload, SyncError>)>,
}

impl TemplateSet {
    /// Reads the template set under `root`.
    ///
    /// `schema_file` names the schema unit to load, if the run needs one.
    pub async fn load(root: &TemplateRoot, schema_file: Option<&str>) -> Self {
        let schema = match schema_file {
            Some(name) => Some(load_schema(&root.file(name), name).await),
            None => None,
        };

        let mut data = Vec::with_capacity(DataKind::ORDER.len());
        for kind in DataKind::ORDER {
            let unit = kind.as_str();
            let payload = read_json(&root.file(&kind.file_name()), unit)
                .await
                .and_then(|value| Payload::classify(unit, value));
            data.push((kind, payload));
        }

        Self { schema, data }
    }
}

async fn load_schema(path: &Path, unit: &str) -> Result<SchemaTemplate, SyncError> {
    let value = read_json(path, unit).await?;
    serde_json::from_value(value).map_err(|e| SyncError::load(unit, e.to_string()))
}

/// Reads and parses one JSON unit.
pub async fn read_json(path: &Path, unit: &str) -> Result<Value, SyncError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SyncError::load(unit, format!("{}: {e}", path.display())))?;

    if content.trim().is_empty() {
        return Err(SyncError::load(unit, EMPTY_UNIT));
    }

    serde_json::from_str(&content).map_err(|e| SyncError::load(unit, e.to_string()))
}
