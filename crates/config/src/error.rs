//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::source::ConfigSource;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was empty in every source
    #[error("required setting '{key}' is not set (secret file, FILE__, URL__, environment)")]
    MissingRequired { key: String },

    /// A file source was configured but could not be read
    #[error("{origin} for '{key}' at {} cannot be read: {reason}", .path.display())]
    UnreadableFile {
        key: String,
        path: PathBuf,
        origin: ConfigSource,
        reason: String,
    },

    /// A value could not be coerced to the expected type
    #[error("invalid value for '{key}': expected {expected}, got '{shown}'")]
    InvalidValue {
        key: String,
        /// Masked when the setting is sensitive
        shown: String,
        expected: &'static str,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
