//! # pawmatch
//!
//! Closest-example breed matching over a persisted feature cache.
//!
//! This library provides:
//! - A feature cache (identifier -> vector) built incrementally and saved as one blob
//! - Label derivation from `<label>_<ordinal>` identifiers
//! - Brute-force Euclidean nearest-neighbor matching with a confidence score
//! - Ratio and per-label tail train/test splits
//! - A held-out evaluation harness reporting accuracy
//! - An HTTP serving boundary
//!
//! ## Example
//!
//! ```rust
//! use pawmatch::{FeatureCache, Matcher, ReferenceSet, Vector};
//!
//! let mut cache = FeatureCache::new(2);
//! cache.insert("a_1", Vector::new(vec![0.0, 0.0])).unwrap();
//! cache.insert("b_1", Vector::new(vec![10.0, 10.0])).unwrap();
//!
//! let result = Matcher::default()
//!     .best_match(&Vector::new(vec![1.0, 1.0]), &ReferenceSet::full(&cache))
//!     .unwrap();
//! assert_eq!(result.label, "a");
//! ```

pub mod advice;
pub mod cache;
pub mod config;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod extractor;
pub mod label;
pub mod matcher;
pub mod metrics;
pub mod persistence;
pub mod server;
pub mod split;
pub mod vector;

pub use cache::{BuildStats, FeatureCache, FeatureCacheStore};
pub use config::Config;
pub use error::{MatchError, Result};
pub use evaluation::{EvaluationReport, Evaluator, Phase};
pub use extractor::{CommandExtractor, FeatureExtractor};
pub use label::LabelExtractor;
pub use matcher::{MatchResult, Matcher, ReferenceSet};
pub use split::{ratio_split, tail_split, Split, SplitPolicy, TailSplit};
pub use vector::Vector;
