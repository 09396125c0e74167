//! Error types and result aliases for the Faultline library.
//!
//! This module defines the core error type [`FaultlineError`] and the [`Result`] type alias
//! used throughout the library. All public APIs that can fail return `Result<T>` for
//! consistent error handling. Fetch paths wrap this type in
//! [`FetchError`](crate::net::FetchError), which adds the captured call trace.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaultlineError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("No fetch backend installed")]
    NoFetchBackend,

    #[error("Response body already consumed")]
    BodyConsumed,

    #[error("Body stream error: {0}")]
    BodyStreamError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, FaultlineError>;
