//! History manager error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Conversation not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
