//! Availability gate: the template root must exist and be writable before
//! anything else runs.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// A template root that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRoot {
    path: PathBuf,
}

impl TemplateRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file directly under the root.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

/// Checks that `path` is an existing, writable directory.
///
/// # Errors
///
/// Returns [`SyncError::Gate`] if the directory is missing, is not a directory,
/// or carries no write permission.
pub async fn check_template_root(path: &Path) -> Result<TemplateRoot, SyncError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| SyncError::gate(path, e))?;

    if !metadata.is_dir() {
        return Err(SyncError::gate(path, io::Error::other("not a directory")));
    }

    if metadata.permissions().readonly() {
        return Err(SyncError::gate(
            path,
            io::Error::new(io::ErrorKind::PermissionDenied, "directory is not writable"),
        ));
    }

    // Mode bits say nothing about the running user; only a real write does.
    probe_write(path).await.map_err(|e| {
        SyncError::gate(
            path,
            io::Error::new(e.kind(), format!("directory is not writable: {e}")),
        )
    })?;

    Ok(TemplateRoot {
        path: path.to_path_buf(),
    })
}

/// Creates and removes a marker file under `dir`.
async fn probe_write(dir: &Path) -> io::Result<()> {
    let marker = dir.join(format!(".seedwork-write-check-{}", std::process::id()));
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&marker)
        .await?;
    tokio::fs::remove_file(&marker).await
}
