//! src/languages.rs
//!
//! Static language table: maps a language id to the interpreter that runs it.
//!
//! The table is built once at startup and shared read-only; there is no way to
//! add or change entries while the service runs.

use crate::error::{Result, SandboxError};
use std::collections::HashMap;
use tracing::warn;

/// Invocation metadata for one supported language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageSpec {
    /// Canonical, lowercase id reported by `/versions`.
    pub id: String,
    /// File extension without the leading dot.
    pub extension: String,
    /// Interpreter executable, looked up on `PATH`.
    pub command: String,
    /// Arguments that make the interpreter print its version.
    pub version_args: Vec<String>,
    /// Reported when the version probe fails.
    pub fallback_version: String,
}

impl LanguageSpec {
    pub fn new(id: &str, extension: &str, command: &str) -> Self {
        Self {
            id: id.to_lowercase(),
            extension: extension.trim_start_matches('.').to_string(),
            command: command.to_string(),
            version_args: vec!["--version".to_string()],
            fallback_version: "Unknown".to_string(),
        }
    }

    pub fn with_version_args(mut self, args: &[&str]) -> Self {
        self.version_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_fallback_version(mut self, fallback: &str) -> Self {
        self.fallback_version = fallback.to_string();
        self
    }

    /// A usable extension is one non-empty file name component with no dots.
    pub fn has_valid_extension(&self) -> bool {
        !self.extension.is_empty()
            && !self
                .extension
                .chars()
                .any(|c| matches!(c, '.' | '/' | '\\') || c.is_whitespace())
    }
}

/// Immutable lookup table from language id (and aliases) to `LanguageSpec`.
#[derive(Clone, Debug)]
pub struct LanguageRegistry {
    specs: Vec<LanguageSpec>,
    index: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Build a registry from explicit entries. Each entry is reachable by its id.
    ///
    /// Entries whose extension could not name a workspace file are dropped.
    pub fn new(specs: Vec<LanguageSpec>) -> Self {
        let specs: Vec<LanguageSpec> = specs
            .into_iter()
            .filter(|spec| {
                let valid = spec.has_valid_extension();
                if !valid {
                    warn!(
                        language = %spec.id,
                        extension = %spec.extension,
                        "skipping language with unusable extension"
                    );
                }
                valid
            })
            .collect();
        let index = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.id.clone(), i))
            .collect();
        Self { specs, index }
    }

    /// The languages the service ships with.
    pub fn builtin() -> Self {
        Self::new(vec![
            LanguageSpec::new("python", "py", "python3").with_fallback_version("Python 3.x"),
            LanguageSpec::new("javascript", "js", "node").with_fallback_version("Node.js"),
            LanguageSpec::new("ruby", "rb", "ruby").with_fallback_version("Ruby"),
            LanguageSpec::new("shell", "sh", "sh")
                .with_version_args(&["-c", "echo POSIX sh"])
                .with_fallback_version("POSIX sh"),
        ])
        .with_alias("py", "python")
        .with_alias("python3", "python")
        .with_alias("js", "javascript")
        .with_alias("node", "javascript")
        .with_alias("rb", "ruby")
        .with_alias("sh", "shell")
        .with_alias("bash", "shell")
    }

    /// Make `alias` resolve to the same entry as `target`. Unknown targets are ignored.
    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        if let Some(&i) = self.index.get(target) {
            self.index.insert(alias.to_lowercase(), i);
        }
        self
    }

    /// Resolve a caller-supplied language id, ignoring case and surrounding whitespace.
    pub fn resolve(&self, language_id: &str) -> Result<&LanguageSpec> {
        let key = language_id.trim().to_lowercase();
        self.index
            .get(&key)
            .map(|&i| &self.specs[i])
            .ok_or_else(|| SandboxError::UnsupportedLanguage(language_id.to_string()))
    }

    /// All entries, in registration order.
    pub fn specs(&self) -> &[LanguageSpec] {
        &self.specs
    }

    /// Distinct file extensions, used to find orphaned workspaces.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.specs.iter().map(|s| s.extension.as_str()).collect();
        exts.sort_unstable();
        exts.dedup();
        exts
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_case_insensitive() {
        let registry = LanguageRegistry::builtin();
        let spec = registry.resolve("  PyThOn ").unwrap();
        assert_eq!(spec.id, "python");
        assert_eq!(spec.extension, "py");
        assert_eq!(spec.command, "python3");
    }

    #[test]
    fn aliases_share_the_canonical_entry() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.resolve("JS").unwrap().id, "javascript");
        assert_eq!(registry.resolve("bash").unwrap().id, "shell");
    }

    #[test]
    fn unknown_language_is_rejected() {
        let registry = LanguageRegistry::builtin();
        match registry.resolve("cobol") {
            Err(SandboxError::UnsupportedLanguage(lang)) => assert_eq!(lang, "cobol"),
            other => panic!("expected UnsupportedLanguage, got {:?}", other),
        }
    }

    #[test]
    fn extensions_are_deduplicated() {
        let registry = LanguageRegistry::new(vec![
            LanguageSpec::new("a", ".sh", "sh"),
            LanguageSpec::new("b", "sh", "bash"),
            LanguageSpec::new("c", "py", "python3"),
        ]);
        assert_eq!(registry.extensions(), vec!["py", "sh"]);
    }

    #[test]
    fn unusable_extensions_are_skipped() {
        let registry = LanguageRegistry::new(vec![
            LanguageSpec::new("up", "../x", "sh"),
            LanguageSpec::new("empty", "", "sh"),
            LanguageSpec::new("double", "tar.gz", "sh"),
            LanguageSpec::new("cpp", "c++", "c++"),
        ]);
        assert!(registry.resolve("up").is_err());
        assert!(registry.resolve("empty").is_err());
        assert!(registry.resolve("double").is_err());
        assert_eq!(registry.resolve("cpp").unwrap().extension, "c++");
        assert_eq!(registry.extensions(), vec!["c++"]);
    }

    #[test]
    fn alias_to_missing_target_is_ignored() {
        let registry = LanguageRegistry::new(vec![]).with_alias("x", "nothing");
        assert!(registry.resolve("x").is_err());
    }
}
