//! Persistence layer: the feature cache is saved and loaded as one snapshot.

pub mod serialization;
pub mod snapshot;
