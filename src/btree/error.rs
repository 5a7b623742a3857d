use std::io;

use thiserror::Error;

/// Errors that can occur during B+ tree operations
#[derive(Debug, Error)]
pub enum BPlusTreeError {
    #[error("Invalid order: {0} (must be >= 3)")]
    InvalidOrder(usize),

    #[error("Invalid tree state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BPlusTreeResult<T> = Result<T, BPlusTreeError>;
