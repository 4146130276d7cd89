use std::path::PathBuf;
use thiserror::Error;

/// Why a usable [`Config`](crate::Config) could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `--config` named a file that does not exist.
    #[error("no config file at {}", .0.display())]
    NotFound(PathBuf),

    #[error("could not write default config: {0}")]
    CreateDefault(String),

    #[error("invalid TOML: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Dotted key, e.g. `discovery.max_attempts`.
        field: String,
        message: String,
    },

    /// No home directory to put the global config in.
    #[error("cannot locate config directory: {0}")]
    Path(String),

    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
