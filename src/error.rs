//! src/error.rs
//!
//! Error taxonomy for the execution sandbox.
//!
//! Every variant is recovered at the request boundary and rendered in-band,
//! so none of these ever stops the service.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while running a submission.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The language id did not resolve in the registry.
    #[error("Language '{0}' is not supported.")]
    UnsupportedLanguage(String),

    /// The workspace file could not be created or written.
    #[error("Failed to create workspace {}: {source}", .path.display())]
    WorkspaceCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The submitted program exited with a non-zero status.
    #[error("{}", describe_exit(.exit_code))]
    RuntimeFailure { exit_code: Option<i32> },

    /// The program exceeded the wall-clock limit.
    #[error("Execution timed out ({}s limit). Check for infinite loops.", .0.as_secs())]
    Timeout(Duration),

    /// Spawn or IO failure around the interpreter process.
    #[error("{0}")]
    SystemError(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("Process exited with status {}", code),
        None => "Process was terminated by a signal".to_string(),
    }
}
