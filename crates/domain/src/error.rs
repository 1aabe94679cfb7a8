use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("tag name must not be empty, got {0:?}")]
    InvalidTagName(String),
    #[error("invalid png stream: {0}")]
    InvalidPng(String),
    #[error("png text chunk for {0:?} does not fit in a chunk length field")]
    ChunkTooLarge(String),
}
