//! Error types for the server crate.

use thiserror::Error;

/// Configuration could not be read, parsed or accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A file-set request that could not be served.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("missing form field: {0}")]
    MissingField(&'static str),

    #[error("malformed {action} payload: {source}")]
    Malformed {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown browser: {0}")]
    UnknownBrowser(String),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl HandlerError {
    /// HTTP status reported to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownAction(_) | Self::MissingField(_) | Self::Malformed { .. } => 400,
            Self::UnknownBrowser(_) => 404,
            Self::Encode(_) => 500,
        }
    }
}

/// Failure to start or run the HTTP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = HandlerError> = std::result::Result<T, E>;
