//! Error taxonomy for the ingestion and query pipeline.
//!
//! Absence is not failure here: a missing index loads as `None` and a
//! duplicate source comes back as [`crate::store::InsertOutcome`], so none of
//! those conditions appear as variants. What remains are the failures a
//! caller can meaningfully report or match on.

use thiserror::Error;

/// Errors surfaced by extraction, indexing, storage, and provider calls.
#[derive(Debug, Error)]
pub enum Error {
    /// File extension not handled by any extractor.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Web page could not be fetched or read.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// An index cannot be built from zero chunks.
    #[error("cannot build an index from an empty chunk batch")]
    EmptyBatch,

    /// Embedding or completion backend failure, after retries where those apply.
    #[error("{provider} provider error: {reason}")]
    Provider { provider: String, reason: String },

    /// A vector's length disagrees with the index dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// PDF bytes could not be parsed.
    #[error("pdf extraction failed: {0}")]
    Pdf(String),

    /// File bytes are not valid UTF-8 text.
    #[error("{0}: not valid UTF-8 text")]
    InvalidEncoding(String),

    /// Persisted index file is unreadable or internally inconsistent.
    #[error("index file corrupt: {0}")]
    CorruptIndex(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
