//! Untrusted-code execution sandbox with a small HTTP front.
//!
//! A submission is written to a uniquely named workspace file, run by the language's
//! interpreter under a wall-clock limit, and the file is removed on every exit path.

mod error;
mod sanitizer;
mod workspace;

pub mod config;
pub mod languages;
pub mod runner;
pub mod sandbox;
pub mod scavenger;
pub mod server;
pub mod versions;

pub use config::{SandboxConfig, ServerArgs};
pub use error::{Result, SandboxError};
pub use languages::{LanguageRegistry, LanguageSpec};
pub use runner::{RunLimits, RunOutcome};
pub use sandbox::{ExecutionRequest, ExecutionResult, ExecutionStatus, Sandbox};
pub use sanitizer::sanitize;
pub use scavenger::SweepReport;
pub use server::{AppState, create_router};
pub use workspace::{Workspace, is_generated_name};
