#![forbid(unsafe_code)]

//! Failure kinds shared across the store and the ingestion flow.
//!
//! Callers inspect the variant rather than matching on message strings; the
//! handlers map each kind to a user-facing message.

use thiserror::Error;

/// Errors surfaced by [`crate::store::SubtitleStore`] write operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional insert found an existing row for the same video id.
    #[error("a record for video id {0} already exists")]
    Duplicate(String),

    #[error("store backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Tagged outcome of one ingestion attempt, in the order the steps can fail.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("video {0} is already ingested")]
    Duplicate(String),

    #[error("subtitle extraction failed: {0}")]
    Extraction(String),

    #[error("store operation failed: {0}")]
    Store(#[source] anyhow::Error),
}
