//! src/versions.rs
//!
//! Runtime version reporting for `GET /versions`.

use crate::error::{Result, SandboxError};
use crate::languages::{LanguageRegistry, LanguageSpec};
use crate::runner::{RunLimits, run_captured};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Time allowed for a single `--version` call.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Ask every registered runtime for its version, in parallel.
///
/// A runtime that is missing, fails, times out or prints nothing is reported with
/// its static fallback string, so this never fails as a whole.
pub fn probe_versions(registry: &LanguageRegistry, timeout: Duration) -> BTreeMap<String, String> {
    registry
        .specs()
        .par_iter()
        .map(|spec| {
            let version = probe_version(spec, timeout).unwrap_or_else(|e| {
                debug!(language = %spec.id, error = %e, "version probe failed, using fallback");
                spec.fallback_version.clone()
            });
            (spec.id.clone(), version)
        })
        .collect()
}

/// Run `command version_args` and return the first non-empty output line.
pub fn probe_version(spec: &LanguageSpec, timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.version_args);

    let output = run_captured(
        cmd,
        &RunLimits {
            timeout,
            max_output_bytes: 4096,
        },
    )?;
    if !output.status.success() {
        return Err(SandboxError::RuntimeFailure {
            exit_code: output.status.code(),
        });
    }

    // Older interpreters (Python 2) print the version on stderr
    first_line(&output.stdout)
        .or_else(|| first_line(&output.stderr))
        .ok_or_else(|| SandboxError::SystemError(format!("{} printed no version", spec.command)))
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn reports_probe_output_or_fallback() {
        let registry = LanguageRegistry::new(vec![
            LanguageSpec::new("shell", "sh", "sh")
                .with_version_args(&["-c", "echo; echo '  sh 1.2  '"])
                .with_fallback_version("POSIX sh"),
            LanguageSpec::new("ghost", "gh", "definitely-not-an-interpreter-7f3a")
                .with_fallback_version("Not installed"),
            LanguageSpec::new("broken", "br", "sh")
                .with_version_args(&["-c", "exit 2"])
                .with_fallback_version("Broken"),
        ]);

        let versions = probe_versions(&registry, PROBE_TIMEOUT);

        assert_eq!(versions.len(), 3);
        assert_eq!(versions["shell"], "sh 1.2");
        assert_eq!(versions["ghost"], "Not installed");
        assert_eq!(versions["broken"], "Broken");
    }

    #[test]
    fn version_on_stderr_is_accepted() {
        let spec = LanguageSpec::new("old", "py", "sh").with_version_args(&["-c", "echo 'Python 2.7' >&2"]);
        assert_eq!(probe_version(&spec, PROBE_TIMEOUT).unwrap(), "Python 2.7");
    }

    #[test]
    fn hanging_probe_times_out() {
        let spec = LanguageSpec::new("slow", "sl", "sh").with_version_args(&["-c", "sleep 30"]);
        assert!(matches!(
            probe_version(&spec, Duration::from_millis(200)),
            Err(SandboxError::Timeout(_))
        ));
    }
}
