//! Schema snapshot applier.
//!
//! Delegates schema reconciliation to an external "apply snapshot" command.
//! Only invocation and result capture happen here; the diffing is owned by the
//! external tool.

use std::path::Path;

use async_trait::async_trait;

use crate::diagnostics::DiagnosticSink;
use crate::error::SyncError;

/// Applies a consolidated schema snapshot file.
#[async_trait]
pub trait SnapshotApplier: Send + Sync {
    /// Applies `snapshot` unattended and returns the tool's textual output.
    async fn apply(&self, snapshot: &Path) -> Result<String, SyncError>;
}

/// Runs an external program: `<program> <args..> <confirm_flag> <snapshot>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApplier {
    program: String,
    args: Vec<String>,
    confirm_flag: Option<String>,
}

impl CommandApplier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            confirm_flag: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Flag passed to skip the tool's interactive confirmation.
    pub fn with_confirm_flag(mut self, flag: impl Into<String>) -> Self {
        let flag = flag.into();
        self.confirm_flag = (!flag.is_empty()).then_some(flag);
        self
    }

    /// Full argument list for `snapshot`.
    pub fn command_line(&self, snapshot: &Path) -> Vec<String> {
        let mut line = self.args.clone();
        line.extend(self.confirm_flag.iter().cloned());
        line.push(snapshot.display().to_string());
        line
    }
}

impl Default for CommandApplier {
    fn default() -> Self {
        Self::new("npx")
            .with_args(["directus", "schema", "apply"])
            .with_confirm_flag("--yes")
    }
}

#[async_trait]
impl SnapshotApplier for CommandApplier {
    async fn apply(&self, snapshot: &Path) -> Result<String, SyncError> {
        let args = self.command_line(snapshot);
        tracing::debug!(program = %self.program, ?args, "running snapshot apply");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| SyncError::external_tool(format!("{}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() { stdout } else { stderr };
        Err(SyncError::external_tool(format!(
            "{} exited with {}: {detail}",
            self.program, output.status
        )))
    }
}

/// Runs `applier` and forwards its output or error to `sink` verbatim.
///
/// The error is returned for reporting only; the run continues either way.
pub async fn apply_snapshot(
    applier: &dyn SnapshotApplier,
    snapshot: &Path,
    sink: &dyn DiagnosticSink,
) -> Result<String, SyncError> {
    match applier.apply(snapshot).await {
        Ok(output) => {
            if !output.is_empty() {
                sink.emit(&output);
            }
            Ok(output)
        }
        Err(e) => {
            tracing::warn!(error = %e, snapshot = %snapshot.display(), "snapshot apply failed");
            sink.emit(&e.to_string());
            Err(e)
        }
    }
}
