//! Runtime configuration shared by the CLI and the server.

use crate::error::{MatchError, Result};
use crate::label::{LabelExtractor, DEFAULT_SEPARATOR};
use crate::matcher::{Matcher, DEFAULT_CONFIDENCE_SCALE};
use crate::persistence::serialization;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Labels reported as the special category (cats, in the pet dataset).
pub const DEFAULT_SPECIAL_LABELS: [&str; 12] = [
    "Abyssinian",
    "Bengal",
    "Birman",
    "Bombay",
    "British_Shorthair",
    "Egyptian_Mau",
    "Maine_Coon",
    "Persian",
    "Ragdoll",
    "Russian_Blue",
    "Siamese",
    "Sphynx",
];

/// Configuration for cache building, matching and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed length of every feature vector.
    pub feature_dimension: usize,
    /// Distance at which confidence bottoms out.
    pub confidence_scale: f32,
    /// Separator between label and ordinal in identifiers.
    pub separator: char,
    /// Persisted cache blob.
    pub cache_path: PathBuf,
    /// Fraction held out by the ratio split.
    pub test_fraction: f64,
    /// Items held out per label by the tail split.
    pub holdout_per_label: usize,
    /// Progress logging cadence, in items.
    pub progress_interval: usize,
    /// Match against a random subset of this many references.
    pub sample_size: Option<usize>,
    /// Seed for splits and sampling; unseeded when absent.
    pub seed: Option<u64>,
    pub special_labels: Vec<String>,
    /// Extension of image files picked up from a directory.
    pub image_extension: String,
    /// External feature program, e.g. `python3 extract_features.py`.
    pub extractor_command: Option<String>,
    /// External advice program; reads the prompt on stdin, writes advice to stdout.
    pub advice_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feature_dimension: 64,
            confidence_scale: DEFAULT_CONFIDENCE_SCALE,
            separator: DEFAULT_SEPARATOR,
            cache_path: PathBuf::from("feature_cache_64.bin"),
            test_fraction: 0.2,
            holdout_per_label: 40,
            progress_interval: 100,
            sample_size: None,
            seed: None,
            special_labels: DEFAULT_SPECIAL_LABELS.iter().map(|s| s.to_string()).collect(),
            image_extension: "jpg".to_string(),
            extractor_command: None,
            advice_command: None,
        }
    }
}

impl Config {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        let config: Config = serialization::from_json(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_dimension == 0 {
            return Err(MatchError::InvalidConfig("feature_dimension must be positive".to_string()));
        }
        if self.confidence_scale.is_nan() || self.confidence_scale <= 0.0 {
            return Err(MatchError::InvalidConfig(format!(
                "confidence_scale must be positive, got {}",
                self.confidence_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.test_fraction) {
            return Err(MatchError::InvalidConfig(format!(
                "test_fraction must be within [0, 1], got {}",
                self.test_fraction
            )));
        }
        if self.sample_size == Some(0) {
            return Err(MatchError::InvalidConfig("sample_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn labels(&self) -> LabelExtractor {
        LabelExtractor::new(self.separator)
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.labels(), self.confidence_scale)
    }

    pub fn is_special(&self, label: &str) -> bool {
        self.special_labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.feature_dimension, 64);
        assert!(config.is_special("Bengal"));
        assert!(!config.is_special("beagle"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pawmatch.json");
        fs::write(&path, r#"{"feature_dimension": 128, "seed": 42}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.feature_dimension, 128);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.holdout_per_label, 40);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad = [
            Config { feature_dimension: 0, ..Config::default() },
            Config { confidence_scale: 0.0, ..Config::default() },
            Config { test_fraction: 1.2, ..Config::default() },
            Config { sample_size: Some(0), ..Config::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(MatchError::InvalidConfig(_))));
        }
    }
}
