use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use seedwork_client::{RestBackend, RestConfig};
use seedwork_db_memory::InMemoryBackend;
use seedwork_storage::DynBackend;
use seedwork_sync::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use seedwork_sync::{
    AppConfig, BackendKind, CommandApplier, SchemaMode, SchemaOutcome, SyncSettings, TemplateSync,
};

#[derive(Parser)]
#[command(name = "seedwork")]
#[command(about = "Reconcile a template directory into a content backend at startup")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to seedwork.toml)
    #[arg(short, long, env = "SEEDWORK_CONFIG")]
    config: Option<String>,

    /// Template directory (overrides template.root)
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Schema mode: objects or snapshot (overrides schema.mode)
    #[arg(long)]
    mode: Option<SchemaMode>,
}

/// The backend a run writes to.
enum Target {
    Rest(DynBackend),
    /// Kept concrete so the journal can be summarized after the run.
    Memory(Arc<InMemoryBackend>),
}

impl Target {
    fn backend(&self) -> DynBackend {
        match self {
            Self::Rest(backend) => backend.clone(),
            Self::Memory(backend) => backend.clone() as DynBackend,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    seedwork_sync::observability::init_tracing();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    let cfg = match load_config(Some(&config_path)).and_then(|cfg| apply_overrides(cfg, &cli)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(path = %config_path, "Configuration loaded");
    seedwork_sync::observability::apply_logging_level(&cfg.logging.level);

    let target = match build_target(&cfg) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Backend initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    let applier = CommandApplier::new(cfg.snapshot.program.clone())
        .with_args(cfg.snapshot.args.clone())
        .with_confirm_flag(cfg.snapshot.confirm_flag.clone());

    let sync = TemplateSync::new(target.backend(), SyncSettings::from_config(&cfg))
        .with_applier(Arc::new(applier));
    let report = sync.run().await;

    if report.gate_passed {
        match &report.schema {
            Some(SchemaOutcome::Objects {
                collections,
                fields,
                relations,
            }) => tracing::info!(
                collections_applied = collections.applied.len(),
                collections_excused = collections.excused.len(),
                fields_created = fields.created,
                fields_updated = fields.updated,
                relations_created = relations.created,
                relations_updated = relations.updated,
                "Schema reconciled"
            ),
            Some(SchemaOutcome::Snapshot { .. }) => tracing::info!("Schema snapshot applied"),
            Some(SchemaOutcome::Failed { reason }) => {
                tracing::warn!(%reason, "Schema stage failed")
            }
            None => {}
        }
        for (kind, outcome) in &report.kinds {
            tracing::info!(kind = %kind, outcome = %outcome, "Data kind processed");
        }
    }

    if let Target::Memory(backend) = &target {
        let summary = backend.journal_summary().await;
        tracing::info!(
            calls = summary.calls,
            writes = summary.writes,
            created = summary.created,
            failed = summary.failed,
            "Rehearsal finished against in-memory backend"
        );
    }
}

/// Applies CLI overrides and re-validates.
fn apply_overrides(mut cfg: AppConfig, cli: &Cli) -> Result<AppConfig, String> {
    if let Some(dir) = &cli.template_dir {
        cfg.template.root = dir.clone();
    }
    if let Some(mode) = cli.mode {
        cfg.schema.mode = mode;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn build_target(cfg: &AppConfig) -> Result<Target> {
    match cfg.backend.kind {
        BackendKind::Memory => Ok(Target::Memory(Arc::new(InMemoryBackend::new()))),
        BackendKind::Rest => {
            let url = cfg
                .backend
                .url
                .clone()
                .context("backend.url is required for the rest backend")?;
            let mut rest = RestConfig::new(url).with_timeout(cfg.backend.timeout());
            if let Some(token) = &cfg.backend.token {
                rest = rest.with_token(token.clone());
            }
            let backend = RestBackend::new(rest).context("could not build REST client")?;
            Ok(Target::Rest(Arc::new(backend)))
        }
    }
}
