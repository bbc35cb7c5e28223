use std::io;

use mural_core::Collection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] mural_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Search needs text or both --from and --to")]
    EmptySearchQuery,
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Nothing to change: pass --set KEY=VALUE or --set-json KEY=JSON")]
    EmptyPatch,
    #[error("Invalid assignment '{0}': expected KEY=VALUE")]
    InvalidAssignment(String),
    #[error("No {collection} record with id {id}")]
    RecordNotFound { collection: Collection, id: String },
    #[error("Configuration error: {0}")]
    Config(String),
}
