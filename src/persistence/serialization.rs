//! Serialization utilities: bincode for the cache blob, JSON for the manifest.

use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};

/// Serializable representation of one cached vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedVector {
    pub id: String,
    pub data: Vec<f32>,
}

/// Serializable representation of the whole feature cache, in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub dimension: usize,
    pub vectors: Vec<SerializedVector>,
}

/// Human-readable summary written next to the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub vector_count: usize,
    pub dimension: usize,
}

impl CacheSnapshot {
    pub fn manifest(&self) -> CacheManifest {
        CacheManifest {
            vector_count: self.vectors.len(),
            dimension: self.dimension,
        }
    }
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| MatchError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| MatchError::SerializationError(e.to_string()))
}

/// Encode data to pretty JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| MatchError::SerializationError(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| MatchError::SerializationError(e.to_string()))
}
