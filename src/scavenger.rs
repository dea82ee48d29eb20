//! src/scavenger.rs
//!
//! Startup sweep for workspace files orphaned by a crashed process.
//!
//! Best effort: a missed orphan only leaks disk space, so every failure here is
//! logged and swallowed.

use crate::workspace::is_generated_name;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Counts from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orphans deleted.
    pub removed: usize,
    /// Files with a supported extension that do not look generated.
    pub skipped: usize,
    /// Orphans whose deletion failed.
    pub failed: usize,
}

/// Delete generated workspace files directly inside `directory`.
///
/// Only regular files whose name matches the `<token>.<ext>` pattern for one of
/// `extensions` are removed. Subdirectories are not visited.
pub fn sweep(directory: &Path, extensions: &[&str]) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %directory.display(), error = %e, "cannot read work directory, skipping sweep");
            return report;
        }
    };

    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        let has_extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e));
        if !has_extension {
            continue;
        }

        if !is_generated_name(name, extensions) {
            debug!(file = name, "leaving non-generated file in place");
            report.skipped += 1;
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(file = name, error = %e, "failed to remove orphaned workspace");
                report.failed += 1;
            }
        }
    }

    info!(
        dir = %directory.display(),
        removed = report.removed,
        skipped = report.skipped,
        failed = report.failed,
        "startup sweep finished"
    );
    report
}
