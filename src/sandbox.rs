//! src/sandbox.rs
//!
//! The sandbox entry point.
//!
//! Orchestrates one submission end to end: language lookup, workspace creation,
//! interpreter execution, error sanitizing and cleanup. The blocking part runs on
//! tokio's blocking pool behind a semaphore, so at most `max_concurrent` interpreters
//! exist at once and the async accept loop is never stalled.
//!
//! # Examples
//! ```no_run
//! use execsandbox::{ExecutionRequest, LanguageRegistry, Sandbox, SandboxConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let sandbox = Sandbox::new(SandboxConfig::default(), LanguageRegistry::builtin())?;
//! let result = sandbox
//!     .run(ExecutionRequest::new("print('hi')", "python"))
//!     .await;
//! println!("{}", result.render());
//! # Ok(())
//! # }
//! ```

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::languages::{LanguageRegistry, LanguageSpec};
use crate::runner::{self, RunLimits, RunOutcome};
use crate::sanitizer::sanitize;
use crate::scavenger::{self, SweepReport};
use crate::versions::{self, PROBE_TIMEOUT};
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

// ==========================================================================================

/// A caller's submission.
#[derive(Clone, Debug, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    /// Clients that predate multi-language support send only `code`.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "python".to_string()
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
        }
    }
}

/// Final classification of a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure,
    Timeout,
    SystemError,
    UnsupportedLanguage,
}

/// What the caller gets back. `error` is already safe to show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub error: String,
}

impl ExecutionResult {
    fn with_error(status: ExecutionStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            error: error.into(),
        }
    }

    fn from_outcome(outcome: RunOutcome, workspace_path: &Path) -> Self {
        match outcome {
            RunOutcome::Success { stdout } => Self {
                status: ExecutionStatus::Success,
                stdout,
                error: String::new(),
            },
            RunOutcome::RuntimeFailure {
                stdout,
                stderr,
                exit_code,
            } => {
                let mut error = sanitize(&stderr, workspace_path);
                if error.is_empty() {
                    error = SandboxError::RuntimeFailure { exit_code }.to_string();
                }
                Self {
                    status: ExecutionStatus::Failure,
                    stdout,
                    error,
                }
            }
            RunOutcome::Timeout { limit } => Self::with_error(
                ExecutionStatus::Timeout,
                SandboxError::Timeout(limit).to_string(),
            ),
            RunOutcome::SystemError { message } => {
                Self::with_error(ExecutionStatus::SystemError, sanitize(&message, workspace_path))
            }
        }
    }

    /// Render the single `output` string returned to HTTP callers.
    pub fn render(&self) -> String {
        match self.status {
            ExecutionStatus::Success => self.stdout.clone(),
            ExecutionStatus::Failure => format!("Execution Error:\n{}", self.error),
            ExecutionStatus::Timeout | ExecutionStatus::UnsupportedLanguage => {
                format!("Error: {}", self.error)
            }
            ExecutionStatus::SystemError => format!("System Error: {}", self.error),
        }
    }
}

// ==========================================================================================

/// Untrusted-code runner shared by all requests.
pub struct Sandbox {
    config: SandboxConfig,
    registry: Arc<LanguageRegistry>,
    permits: Arc<Semaphore>,
}

impl Sandbox {
    /// Validate `config`, create the work directory and fix its absolute path.
    pub fn new(mut config: SandboxConfig, registry: LanguageRegistry) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.work_dir).with_context(|| {
            format!("Failed to create work directory {}", config.work_dir.display())
        })?;
        config.work_dir = config.work_dir.canonicalize().with_context(|| {
            format!("Failed to resolve work directory {}", config.work_dir.display())
        })?;

        let permits = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            config,
            registry: Arc::new(registry),
            permits,
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// Remove workspaces orphaned by a previous crash. Call once, before serving.
    pub fn sweep_orphans(&self) -> SweepReport {
        scavenger::sweep(&self.config.work_dir, &self.registry.extensions())
    }

    /// Run one submission. Never fails: every problem is reported in the result.
    pub async fn run(&self, request: ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();

        // Reject before touching the filesystem
        let spec = match self.registry.resolve(&request.language) {
            Ok(spec) => spec.clone(),
            Err(e) => {
                info!(language = %request.language, "unsupported language");
                return ExecutionResult::with_error(
                    ExecutionStatus::UnsupportedLanguage,
                    e.to_string(),
                );
            }
        };

        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return ExecutionResult::with_error(
                    ExecutionStatus::SystemError,
                    "Sandbox is shutting down",
                );
            }
        };

        let work_dir = self.config.work_dir.clone();
        let limits = self.limits();
        let language = spec.id.clone();

        // The permit moves into the worker so it stays held even if the caller goes away.
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            run_blocking(&work_dir, &spec, &request.code, &limits)
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "execution worker failed");
            ExecutionResult::with_error(ExecutionStatus::SystemError, "Execution worker failed")
        });

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result.status {
            ExecutionStatus::Success | ExecutionStatus::Failure => {
                info!(language = %language, status = ?result.status, elapsed_ms, "execution finished")
            }
            _ => warn!(language = %language, status = ?result.status, elapsed_ms, "execution finished"),
        }
        result
    }

    /// Report every runtime's version, falling back to static strings.
    pub async fn versions(&self) -> BTreeMap<String, String> {
        let registry = Arc::clone(&self.registry);
        let fallback: BTreeMap<String, String> = registry
            .specs()
            .iter()
            .map(|s| (s.id.clone(), s.fallback_version.clone()))
            .collect();

        tokio::task::spawn_blocking(move || versions::probe_versions(&registry, PROBE_TIMEOUT))
            .await
            .unwrap_or(fallback)
    }

    fn limits(&self) -> RunLimits {
        RunLimits {
            timeout: self.config.timeout(),
            max_output_bytes: self.config.max_output_bytes,
        }
    }
}

/// Acquire a workspace, run it, and release it. Blocks for up to the timeout.
///
/// The workspace is also released by its `Drop` impl, so a panic inside the runner
/// still removes the file.
pub fn run_blocking(
    work_dir: &Path,
    spec: &LanguageSpec,
    code: &str,
    limits: &RunLimits,
) -> ExecutionResult {
    let mut workspace = match Workspace::acquire(work_dir, &spec.extension, code) {
        Ok(workspace) => workspace,
        Err(e) => {
            warn!(error = %e, "workspace creation failed");
            return ExecutionResult::with_error(
                ExecutionStatus::SystemError,
                "Failed to prepare the execution workspace",
            );
        }
    };

    let outcome = runner::execute(&workspace, spec, limits);
    let result = ExecutionResult::from_outcome(outcome, workspace.path());
    workspace.release();
    result
}
