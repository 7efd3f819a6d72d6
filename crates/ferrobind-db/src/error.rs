//! Store error types.

use ferrobind_common::FerrobindError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot format {found} is not supported (expected {expected})")]
    UnsupportedSnapshot { expected: u32, found: u32 },

    #[error("Value stored under {key} has the wrong shape")]
    WrongShape { key: String },
}

impl From<StoreError> for FerrobindError {
    fn from(err: StoreError) -> Self {
        FerrobindError::Store(err.to_string())
    }
}
