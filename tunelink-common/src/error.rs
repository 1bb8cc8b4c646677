//! Common error types for TuneLink

use thiserror::Error;

/// Common result type for TuneLink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across TuneLink crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input supplied by a collaborator
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal engine error
    #[error("Internal error: {0}")]
    Internal(String),
}
