use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    /// External snapshot-apply command, used when `schema.mode = "snapshot"`
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.template.root.as_os_str().is_empty() {
            return Err("template.root must not be empty".into());
        }
        if self.template.collections_file.trim().is_empty() {
            return Err("template.collections_file must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Backend validation
        if self.backend.kind == BackendKind::Rest {
            let url = self.backend.url.as_deref().unwrap_or("").trim();
            if url.is_empty() {
                return Err("backend.kind=rest requires backend.url".into());
            }
            if let Err(e) = url::Url::parse(url) {
                return Err(format!("backend.url is not a valid URL: {e}"));
            }
        }
        if self.backend.timeout_ms == 0 {
            return Err("backend.timeout_ms must be > 0".into());
        }
        if self.schema.mode == SchemaMode::Snapshot {
            if self.snapshot.program.trim().is_empty() {
                return Err("schema.mode=snapshot requires snapshot.program".into());
            }
            if self.template.snapshot_file.trim().is_empty() {
                return Err("schema.mode=snapshot requires template.snapshot_file".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_root")]
    pub root: PathBuf,
    #[serde(default = "default_collections_file")]
    pub collections_file: String,
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
}
fn default_template_root() -> PathBuf {
    PathBuf::from("/directus/templates")
}
fn default_collections_file() -> String {
    "collections.json".into()
}
fn default_snapshot_file() -> String {
    "snapshot.yaml".into()
}
impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            root: default_template_root(),
            collections_file: default_collections_file(),
            snapshot_file: default_snapshot_file(),
        }
    }
}

/// How the schema stage reconciles collections, fields and relations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMode {
    /// Per-object resolution against the backend.
    #[default]
    Objects,
    /// One call to the external snapshot-apply command.
    Snapshot,
}

impl std::str::FromStr for SchemaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "objects" => Ok(Self::Objects),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(format!("unknown schema mode '{other}' (expected objects or snapshot)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaConfig {
    #[serde(default)]
    pub mode: SchemaMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_program")]
    pub program: String,
    #[serde(default = "default_snapshot_args")]
    pub args: Vec<String>,
    /// Appended before the snapshot path; empty to omit
    #[serde(default = "default_confirm_flag")]
    pub confirm_flag: String,
}
fn default_snapshot_program() -> String {
    "npx".into()
}
fn default_snapshot_args() -> Vec<String> {
    vec!["directus".into(), "schema".into(), "apply".into()]
}
fn default_confirm_flag() -> String {
    "--yes".into()
}
impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            program: default_snapshot_program(),
            args: default_snapshot_args(),
            confirm_flag: default_confirm_flag(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Directus-style REST API
    #[default]
    Rest,
    /// Empty in-memory backend (rehearsal run)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default = "default_backend_url")]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}
fn default_backend_url() -> Option<String> {
    Some("http://localhost:8055".into())
}
fn default_timeout_ms() -> u64 {
    30_000
}
impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: default_backend_url(),
            token: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}
impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "seedwork.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        // A missing file is fine; defaults and env still apply
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., SEEDWORK__BACKEND__URL=http://directus:8055
        builder = builder.add_source(
            Environment::with_prefix("SEEDWORK")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
