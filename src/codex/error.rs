use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodexError {
    #[error("Entry not found: {book} #{uid}")]
    EntryNotFound { book: String, uid: u64 },

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Entry type not found: {0}")]
    TypeNotFound(String),

    #[error("Entry type no longer exists: {name} ({id})")]
    OrphanedType { id: String, name: String },

    #[error("Malformed metadata block: {0}")]
    Decode(String),

    #[error("Invalid key pattern {key:?}: {reason}")]
    InvalidPattern { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Api Error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, CodexError>;
