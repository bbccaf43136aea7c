//! Error types and handling for configuration resolution

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::diagnostics::IgnoreReason;

/// Dotted key path at which a validation error occurred (e.g. `rules.foo`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a key path from its segments, outermost first
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Prepend an enclosing key
    pub fn prefixed(mut self, key: impl Into<String>) -> Self {
        self.0.insert(0, key.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dotted form, e.g. `languageOptions.globals`
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "Key \"{segment}\": ")?;
        }
        Ok(())
    }
}

/// Main error type for configuration resolution
///
/// Errors are `Clone` so that a single failed load can be handed to every
/// caller awaiting the same cache entry.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Unexpected key, wrong value shape, invalid enumerated value or severity
    #[error("{path}{message}")]
    Schema { path: KeyPath, message: String },

    /// Unknown plugin namespace, unknown rule/parser/processor or plugin redefinition
    #[error("{path}{message}")]
    PluginResolution { path: KeyPath, message: String },

    /// No configuration file could be located
    #[error("Could not find config file (searched upward from '{}').", start_dir.display())]
    SourceNotFound { start_dir: PathBuf },

    /// A located configuration file could not be read or parsed
    #[error("Failed to load config from '{}': {message}", path.display())]
    SourceLoad { path: PathBuf, message: String },

    /// File system I/O errors
    #[error("IO error for path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Named processor missing, missing capability or runaway expansion
    #[error("Processor error in '{name}': {message}")]
    Processor { name: String, message: String },

    /// A requested path is ignored or unmatched while unmatched paths are fatal
    #[error("No configuration applies to '{}': {reason}", path.display())]
    NoMatch { path: PathBuf, reason: IgnoreReason },

    /// A `files` or `ignores` glob could not be compiled
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A path argument was empty or could not be made absolute
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// A background cache computation panicked or was cancelled
    #[error("Background task failed: {message}")]
    Task { message: String },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    PluginResolution,
    SourceNotFound,
    SourceLoad,
    Io,
    Processor,
    NoMatch,
    Pattern,
    Path,
    Task,
}

impl ConfigError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Schema { .. } => ErrorKind::Schema,
            ConfigError::PluginResolution { .. } => ErrorKind::PluginResolution,
            ConfigError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            ConfigError::SourceLoad { .. } => ErrorKind::SourceLoad,
            ConfigError::Io { .. } => ErrorKind::Io,
            ConfigError::Processor { .. } => ErrorKind::Processor,
            ConfigError::NoMatch { .. } => ErrorKind::NoMatch,
            ConfigError::InvalidPattern { .. } => ErrorKind::Pattern,
            ConfigError::InvalidPath { .. } => ErrorKind::Path,
            ConfigError::Task { .. } => ErrorKind::Task,
        }
    }

    /// Whether the batch can continue with other paths after this error
    ///
    /// Only per-path outcomes are recoverable; anything wrong with the
    /// configuration itself poisons every path that depends on it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::NoMatch | ErrorKind::Path)
    }

    /// The key path for schema and plugin errors
    pub fn key_path(&self) -> Option<&KeyPath> {
        match self {
            ConfigError::Schema { path, .. } | ConfigError::PluginResolution { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }

    /// Create a schema error at the top level
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            path: KeyPath::new(),
            message: message.into(),
        }
    }

    /// Create a schema error under a single key
    pub fn schema_at(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: KeyPath::from_segments([key.into()]),
            message: message.into(),
        }
    }

    /// Create a plugin resolution error
    pub fn plugin_resolution(path: KeyPath, message: impl Into<String>) -> Self {
        Self::PluginResolution {
            path,
            message: message.into(),
        }
    }

    /// Create a source load error
    pub fn source_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SourceLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Create a processor error
    pub fn processor(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processor {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Nest this error under an enclosing key
    ///
    /// Only schema and plugin errors carry a key path; other errors are
    /// returned unchanged.
    pub fn under(self, key: impl Into<String>) -> Self {
        match self {
            ConfigError::Schema { path, message } => ConfigError::Schema {
                path: path.prefixed(key),
                message,
            },
            ConfigError::PluginResolution { path, message } => ConfigError::PluginResolution {
                path: path.prefixed(key),
                message,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: Arc::new(err),
        }
    }
}
