/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Object store rejected {bucket}/{key} (status {status}): {message}")]
    Rejected {
        bucket: String,
        key: String,
        status: u16,
        message: String,
    },

    #[error("Invalid storage configuration: {0}")]
    Config(String),

    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Payload(err.to_string())
    }
}
