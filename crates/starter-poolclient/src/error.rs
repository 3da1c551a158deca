use thiserror::Error;

use crate::events::PoolEventParseError;

#[derive(Debug, Error)]
pub enum PoolClientError {
    #[error("pool manager request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to parse pool manager response")]
    ResponseParse(#[from] serde_json::Error),
    #[error("pool manager returned error [{code}]: {message}")]
    Server { code: i32, message: String },
    #[error(transparent)]
    Event(#[from] PoolEventParseError),
}
