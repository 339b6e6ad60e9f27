//! Error types for the mirror

use thiserror::Error;

/// Mirror-wide error type
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MirrorError {
    pub fn api(msg: impl Into<String>) -> Self {
        MirrorError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        MirrorError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        MirrorError::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        MirrorError::Config(msg.into())
    }
}

/// Result type alias for mirror operations
pub type MirrorResult<T> = Result<T, MirrorError>;
