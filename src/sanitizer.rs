//! src/sanitizer.rs
//!
//! Scrubs the internal workspace path out of interpreter error output.
//!
//! # Example
//! ```text
//! # Raw (Python):
//!   File "/tmp/exec-sandbox/3f2a...9c.py", line 2, in <module>
//!     raise ValueError("bad")
//! ValueError: bad
//!
//! # Sanitized:
//! Line 2, in <module>
//!     raise ValueError("bad")
//! ValueError: bad
//! ```

use regex::Regex;
use std::path::Path;

/// Neutral marker that replaces `<path>/<file>` and the interpreter's location glue.
const LOCATION_MARKER: &str = "Line ";

/// Stand-in for any bare mention of the workspace token.
const TOKEN_MARKER: &str = "main";

/// Remove every mention of the workspace file (with its directory) from `raw`.
///
/// Recognized location forms, all rewritten to `Line `:
/// - `File "<dir>/<name>", line ` (Python)
/// - `<dir>/<name>: line ` (bash)
/// - `<dir>/<name>:` (Node, Ruby, dash)
///
/// `<dir>` is matched literally against the workspace's own directory first, so
/// directories containing spaces are removed whole. Other path-like prefixes (a
/// relative or symlinked spelling) are removed up to the nearest whitespace.
///
/// Leftover occurrences of the file stem are replaced with `main`. The result is
/// trimmed. This never fails: text without a match comes back unchanged apart from
/// trimming, and sanitizing already sanitized text is a no-op.
pub fn sanitize(raw: &str, workspace_path: &Path) -> String {
    let Some(file_name) = workspace_path.file_name().and_then(|n| n.to_str()) else {
        return raw.trim().to_string();
    };

    let known_dir = workspace_path
        .parent()
        .and_then(|dir| dir.to_str())
        .filter(|dir| !dir.is_empty())
        .map(|dir| format!("{}[/\\\\]|", regex::escape(dir.trim_end_matches(['/', '\\']))))
        .unwrap_or_default();
    let pattern = format!(
        r#"(?:File\s+")?(?:{}[^\s"'(]*[/\\])?{}(?:",\s*line\s+|:\s*line\s+|:\s*)?"#,
        known_dir,
        regex::escape(file_name)
    );
    let scrubbed = match Regex::new(&pattern) {
        Ok(re) => re.replace_all(raw, LOCATION_MARKER).into_owned(),
        Err(_) => raw.replace(file_name, LOCATION_MARKER),
    };

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let scrubbed = if stem.is_empty() {
        scrubbed
    } else {
        scrubbed.replace(stem, TOKEN_MARKER)
    };

    scrubbed.trim().to_string()
}
