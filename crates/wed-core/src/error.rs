//! Error types for the Wednesday core library.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Settings errors.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Settings are missing or inconsistent.
    #[error("invalid settings: {message}")]
    Settings {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A settings source could not be parsed into [`crate::Settings`].
    #[error("cannot parse settings: {0}")]
    Parse(#[from] config::ConfigError),
}

impl CoreError {
    /// Settings error with a message only.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Settings {
            message: message.into(),
            source: None,
        }
    }

    /// Settings error caused by `source`.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Settings {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error() {
        let err = CoreError::config("output_dir cannot be empty");
        assert_eq!(err.to_string(), "invalid settings: output_dir cannot be empty");
    }

    #[test]
    fn test_settings_error_keeps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = CoreError::config_with_source("cannot read wed-settings.json", source);
        assert!(std::error::Error::source(&err).is_some());
    }
}
