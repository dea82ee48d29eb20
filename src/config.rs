//! src/config.rs
//!
//! Sandbox and server configuration.

use anyhow::{Result, ensure};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// ==========================================================================================

/// Configuration for `Sandbox`.
#[derive(Clone, Debug)]
pub struct SandboxConfig {
    /// Maximum wall-clock execution time per submission in seconds.
    ///
    /// The whole process group is killed once this elapses, regardless of CPU usage.
    pub timeout_seconds: u64,

    /// Maximum number of interpreter processes running at the same time.
    ///
    /// Requests above the cap wait for a free slot instead of spawning.
    pub max_concurrent: usize,

    /// Upper bound on captured bytes per stream (stdout and stderr each).
    pub max_output_bytes: usize,

    /// Directory where workspace files are created and swept on startup.
    pub work_dir: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 5,
            max_concurrent: default_max_concurrent(),
            max_output_bytes: 1024 * 1024,
            work_dir: std::env::temp_dir().join("exec-sandbox"),
        }
    }
}

impl SandboxConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.timeout_seconds > 0,
            "timeout_seconds (wall-clock timeout) must be at least 1, got {}",
            self.timeout_seconds
        );
        ensure!(
            self.max_concurrent > 0,
            "max_concurrent must be at least 1, got {}",
            self.max_concurrent
        );
        ensure!(
            self.max_output_bytes >= 1024,
            "max_output_bytes must be at least 1024, got {}",
            self.max_output_bytes
        );
        ensure!(
            !self.work_dir.as_os_str().is_empty(),
            "work_dir must not be empty"
        );

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_max_concurrent() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// ==========================================================================================

/// Command-line arguments for the HTTP service.
#[derive(Parser, Debug, Clone)]
#[command(name = "exec-sandbox", version, about = "Run untrusted snippets under a time limit")]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "EXEC_SANDBOX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "EXEC_SANDBOX_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory for workspace files
    #[arg(long, env = "EXEC_SANDBOX_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Wall-clock limit per submission, in seconds
    #[arg(long, env = "EXEC_SANDBOX_TIMEOUT_SECONDS", default_value_t = 5)]
    pub timeout_seconds: u64,

    /// Maximum simultaneous executions (defaults to the number of CPUs)
    #[arg(long, env = "EXEC_SANDBOX_MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// Captured bytes kept per output stream
    #[arg(long, env = "EXEC_SANDBOX_MAX_OUTPUT_BYTES", default_value_t = 1024 * 1024)]
    pub max_output_bytes: usize,

    /// Do not remove orphaned workspace files at startup
    #[arg(long, env = "EXEC_SANDBOX_SKIP_SWEEP")]
    pub skip_sweep: bool,
}

impl ServerArgs {
    pub fn sandbox_config(&self) -> Result<SandboxConfig> {
        let defaults = SandboxConfig::default();
        let config = SandboxConfig {
            timeout_seconds: self.timeout_seconds,
            max_concurrent: self.max_concurrent.unwrap_or(defaults.max_concurrent),
            max_output_bytes: self.max_output_bytes,
            work_dir: self.work_dir.clone().unwrap_or(defaults.work_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SandboxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = SandboxConfig {
            timeout_seconds: 0,
            ..SandboxConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = SandboxConfig {
            max_concurrent: 0,
            ..SandboxConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn args_map_onto_sandbox_config() {
        let args = ServerArgs::parse_from([
            "exec-sandbox",
            "--port",
            "9000",
            "--timeout-seconds",
            "2",
            "--max-concurrent",
            "3",
            "--work-dir",
            "/var/tmp/runs",
        ]);
        let config = args.sandbox_config().unwrap();

        assert_eq!(args.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.timeout_seconds, 2);
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.work_dir, PathBuf::from("/var/tmp/runs"));
    }
}
