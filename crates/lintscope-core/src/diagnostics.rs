//! User-facing warnings produced while resolving configuration

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a path received no configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IgnoreReason {
    /// Ignored by one of the always-on default patterns
    Default { pattern: String },
    /// Ignored by a pattern from configuration, the command line or an ignore file
    Pattern { pattern: String },
    /// The path lies outside the base path of its configuration
    OutsideBasePath,
    /// Not ignored, but no `files` entry of any fragment matched it
    Unmatched,
}

impl IgnoreReason {
    /// Directory named by a default pattern like `**/node_modules/`
    fn default_directory(pattern: &str) -> Option<&str> {
        let trimmed = pattern.trim_end_matches("/**").trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|name| !name.is_empty())
    }

    pub fn message(&self) -> String {
        match self {
            IgnoreReason::Default { pattern } => {
                let location = match Self::default_directory(pattern) {
                    Some(dir) => format!("it is located under the {dir} directory"),
                    None => format!("it matches the default pattern \"{pattern}\""),
                };
                let unignore = if pattern.starts_with("**/") || pattern.ends_with('/') {
                    format!("!{pattern}")
                } else {
                    format!("!**/{pattern}")
                };
                format!(
                    "File ignored by default because {location}. Use ignore pattern \"{unignore}\" to disable file ignore settings or use \"--no-warn-ignored\" to suppress this warning."
                )
            }
            IgnoreReason::Pattern { .. } => "File ignored because of a matching ignore pattern. Use \"--no-ignore\" to disable file ignore settings or use \"--no-warn-ignored\" to suppress this warning.".to_string(),
            IgnoreReason::OutsideBasePath => {
                "File ignored because outside of base path.".to_string()
            }
            IgnoreReason::Unmatched => {
                "File ignored because no matching configuration was supplied.".to_string()
            }
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Non-fatal problems found in a configuration source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConfigWarning {
    /// The source evaluated to nothing: empty file, `[]` or `{}`
    EmptyConfig { path: PathBuf },
    /// An ignore file named in the options does not exist
    MissingIgnoreFile { path: PathBuf },
}

impl ConfigWarning {
    pub fn message(&self) -> String {
        match self {
            ConfigWarning::EmptyConfig { path } => format!(
                "Config file '{}' resolved to an empty configuration. Check that it exports at least one configuration object.",
                path.display()
            ),
            ConfigWarning::MissingIgnoreFile { path } => {
                format!("Ignore file '{}' does not exist.", path.display())
            }
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Warning-level diagnostic for one explicitly requested path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDiagnostic {
    pub path: PathBuf,
    pub reason: IgnoreReason,
    pub message: String,
}

impl PathDiagnostic {
    pub fn new(path: &Path, reason: IgnoreReason) -> Self {
        Self {
            path: path.to_path_buf(),
            message: reason.message(),
            reason,
        }
    }

    /// Whether the path was dropped by an always-on default pattern
    pub fn is_default_ignore(&self) -> bool {
        matches!(self.reason, IgnoreReason::Default { .. })
    }
}
