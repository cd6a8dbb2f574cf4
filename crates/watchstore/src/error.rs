use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Quota exceeded for {key}: {size} bytes exceeds limit of {limit}")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Malformed data under {key}: {reason}")]
    MalformedData { key: String, reason: String },

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl StoreError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(String),

    #[error("step from {from} failed: {reason}")]
    Transform { from: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
