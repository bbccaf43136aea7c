//! Result type alias for configuration resolution

use crate::error::ConfigError;

/// Standard Result type for configuration resolution
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Extension trait for Result to provide additional convenience methods
pub trait ResultExt<T> {
    /// Convert an error to `None` when it only concerns a single path
    fn recoverable(self) -> Result<Option<T>>;

    /// Nest a schema or plugin error under an enclosing key
    fn under_key(self, key: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn recoverable(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                tracing::warn!("Recoverable error: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn under_key(self, key: &str) -> Result<T> {
        self.map_err(|err| err.under(key))
    }
}
