//! Error types for chatweave-core

use thiserror::Error;

/// Main error type for the chatweave-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session or bot metadata could not be obtained.
    ///
    /// Outbound sends are blocked until a bootstrap succeeds; the message is
    /// meant to be shown to the user.
    #[error("session bootstrap failed: {0}")]
    Bootstrap(String),

    /// A timeout could not be armed (no async runtime available)
    #[error("timer error: {0}")]
    Timer(String),
}

/// Result type alias for chatweave-core
pub type Result<T> = std::result::Result<T, Error>;
