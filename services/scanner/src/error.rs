//! services/scanner/src/error.rs
//!
//! Defines the primary error type for the entire scanner service.

use crate::config::ConfigError;
use veritrace_core::ports::{MediaError, ResolveError};

/// The primary error type for the `scanner` service.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents a fatal camera-acquisition failure from the media port.
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Represents a lookup transport failure from the resolver port.
    #[error("Resolver error: {0}")]
    Resolve(#[from] ResolveError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error related to the WebSocket connection.
    #[error("WebSocket Error: {0}")]
    Websocket(#[from] axum::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
