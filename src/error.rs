//! Error types for cache, matching and evaluation

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pawmatch operations
pub type Result<T> = std::result::Result<T, MatchError>;

/// Error types that can occur while building, matching or evaluating
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Feature cache not found: {}", path.display())]
    CacheMissing { path: PathBuf },

    #[error("Identifier not in feature cache: {id}")]
    KeyNotFound { id: String },

    #[error("Reference set is empty")]
    EmptyReferenceSet,

    #[error("Feature extraction failed for {id}: {reason}")]
    Extraction { id: String, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Advice generation failed: {reason}")]
    Advice { reason: String },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
