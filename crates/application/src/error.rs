use std::path::PathBuf;

use tagshelf_domain::DomainError;
use thiserror::Error;

use crate::TagEditResult;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("failed to write tags to {}: {message}", path.display())]
    TagWrite { path: PathBuf, message: String },
    /// A tag edit stopped part-way; `applied` covers the files already rewritten.
    #[error("tag edit stopped after {} file(s): {cause}", applied.updated.len())]
    TagEditAborted {
        cause: Box<ApplicationError>,
        applied: Box<TagEditResult>,
    },
    #[error("an index scan is already running")]
    Busy,
    #[error("{0} worker has shut down")]
    WorkerGone(&'static str),
}

/// Failure of a single metadata extraction; never aborts a scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The file vanished or could not be opened while scanning.
    #[error("transient file error: {0}")]
    Transient(String),
    #[error("metadata extraction failed: {0}")]
    Failed(String),
}
