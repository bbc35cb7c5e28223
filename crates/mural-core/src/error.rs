//! Error types for mural-core

use thiserror::Error;

use crate::models::Collection;
use crate::remote::RemoteError;

/// Result type alias using mural-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mural-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote store call failed and no local fallback applies
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// `SQLite` error from the local cache database
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A newer read for the same collection was issued while this one was in flight
    #[error("Superseded {collection} request #{ticket}")]
    Superseded { collection: Collection, ticket: u64 },
}

impl Error {
    /// Whether the error only means a newer request took over.
    pub const fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}
