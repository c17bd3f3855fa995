use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can terminate the sidecar at start-up.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A required variable was missing or a value was malformed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The initial rule refresh produced no usable snapshot.
    #[error("rule refresh error: {0}")]
    Refresh(#[from] gatehouse_appconfig::AppConfigError),
}
