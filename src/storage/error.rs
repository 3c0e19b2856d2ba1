use thiserror::Error;

use crate::audio_engine::errors::ErrorKind;

/// Errors returned by the persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened; every operation fails with this.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to (de)serialize setting: {0}")]
    Serde(#[from] serde_json::Error),

    /// A row holds values that cannot describe a sample record.
    #[error("stored record `{pad_id}` is corrupt: {reason}")]
    CorruptRow { pad_id: String, reason: String },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) | StoreError::Sqlite(_) => ErrorKind::StoreUnavailable,
            StoreError::Serde(_) | StoreError::CorruptRow { .. } => ErrorKind::CorruptData,
        }
    }
}
