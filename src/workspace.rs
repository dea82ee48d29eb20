//! src/workspace.rs
//!
//! Per-request workspace files.
//!
//! A workspace is a single source file named `<token>.<ext>`, where `<token>` is a
//! random 128-bit UUID rendered as 32 lowercase hex characters. The file is created
//! exclusively and is removed when the `Workspace` is released or dropped, so every
//! exit path of an execution (normal return, timeout, early error, unwinding) ends
//! with the file gone.

use crate::error::{Result, SandboxError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, warn};
use uuid::Uuid;

/// Name pattern produced by `Workspace::acquire`: 32 hex chars, a dot, an extension.
/// The extension may be any single path component without dots (`py`, `c++`).
static GENERATED_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-f]{32})\.([^./\\\s]+)$").unwrap());

/// Check whether `file_name` looks like a generated workspace name with one of
/// the given extensions.
///
/// Hand-written files that happen to share an extension (`main.py`, `run.sh`) never
/// match, which keeps cleanup from touching them.
pub fn is_generated_name(file_name: &str, extensions: &[&str]) -> bool {
    GENERATED_NAME_PATTERN
        .captures(file_name)
        .is_some_and(|caps| extensions.iter().any(|ext| *ext == &caps[2]))
}

/// A source file owned by exactly one in-flight execution.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    token: String,
    extension: String,
    file: Option<TempPath>,
}

impl Workspace {
    /// Create `<dir>/<token>.<extension>` and write `code` into it.
    ///
    /// # Arguments:
    /// - `dir`: directory that holds workspace files (should be absolute)
    /// - `extension`: file extension without the dot
    /// - `code`: caller-supplied source text
    ///
    /// # Returns
    /// The owned workspace, or `SandboxError::WorkspaceCreate` if the path already
    /// exists or the write fails. A partially written file is removed before returning.
    pub fn acquire(dir: &Path, extension: &str, code: &str) -> Result<Self> {
        let token = Uuid::new_v4().simple().to_string();
        let suffix = format!(".{}", extension);
        let intended = dir.join(format!("{}{}", token, suffix));

        // No random bytes beyond the token: an existing path fails instead of retrying.
        let mut temp_file = Builder::new()
            .prefix(&token)
            .suffix(&suffix)
            .rand_bytes(0)
            .tempfile_in(dir)
            .map_err(|source| SandboxError::WorkspaceCreate {
                path: intended.clone(),
                source,
            })?;

        temp_file
            .write_all(code.as_bytes())
            .and_then(|_| temp_file.flush())
            .map_err(|source| SandboxError::WorkspaceCreate {
                path: intended.clone(),
                source,
            })?;

        let path = temp_file.path().to_path_buf();
        debug!(path = %path.display(), bytes = code.len(), "workspace created");

        Ok(Self {
            path,
            token,
            extension: extension.to_string(),
            file: Some(temp_file.into_temp_path()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Random token used as the file stem.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// `<token>.<extension>`, the name interpreters print in their tracebacks.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.token, self.extension)
    }

    /// Remove the workspace file.
    ///
    /// Idempotent: later calls do nothing, and a file that is already gone is not an
    /// error. The name is checked against the generated pattern before deleting.
    pub fn release(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };

        let file_name = self.file_name();
        if !is_generated_name(&file_name, &[self.extension.as_str()]) {
            warn!(path = %self.path.display(), "refusing to delete non-generated file");
            let _ = file.keep();
            return;
        }

        match file.close() {
            Ok(()) => debug!(path = %self.path.display(), "workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove workspace"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}
