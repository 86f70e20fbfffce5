//! Feature extractor boundary.
//!
//! The pretrained network that turns an image into a vector lives outside this
//! crate. [`FeatureExtractor`] is the seam; [`extract_or_zero`] applies the
//! zero-vector fallback so a single bad sample never fails the caller.

use crate::error::{MatchError, Result};
use crate::vector::Vector;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Turns one raw item into a feature vector.
pub trait FeatureExtractor {
    /// Extract the raw feature output for `item`.
    ///
    /// The output may be longer than the configured dimension; callers fit it
    /// with [`Vector::fit_to`].
    fn extract(&self, item: &Path) -> Result<Vector>;
}

impl<F> FeatureExtractor for F
where
    F: Fn(&Path) -> Result<Vector>,
{
    fn extract(&self, item: &Path) -> Result<Vector> {
        self(item)
    }
}

/// Extract `item` and fit it to `dimension`, substituting a zero vector on any
/// failure.
pub fn extract_or_zero<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    item: &Path,
    dimension: usize,
) -> Vector {
    match extractor
        .extract(item)
        .and_then(|raw| raw.fit_to(dimension))
    {
        Ok(vector) => vector,
        Err(e) => {
            tracing::warn!("Feature extraction failed for {}: {}", item.display(), e);
            Vector::zeros(dimension)
        }
    }
}

/// Runs an external program per item and reads the vector from its stdout.
///
/// The item path is appended as the last argument. Output is a single line of
/// comma-separated floats.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a shell-like command line (whitespace separated, no quoting).
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| MatchError::InvalidConfig("Empty extractor command".to_string()))?;
        Ok(Self::new(program, parts.map(str::to_string).collect()))
    }
}

impl FeatureExtractor for CommandExtractor {
    fn extract(&self, item: &Path) -> Result<Vector> {
        let id = item.display().to_string();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(item)
            .output()
            .map_err(|e| MatchError::Extraction {
                id: id.clone(),
                reason: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            return Err(MatchError::Extraction {
                id,
                reason: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Vector::from_str(stdout.trim()).map_err(|e| MatchError::Extraction {
            id,
            reason: e.to_string(),
        })
    }
}

/// Extractor for deployments without a feature program: every item fails and
/// falls back to the zero vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableExtractor;

impl FeatureExtractor for UnavailableExtractor {
    fn extract(&self, item: &Path) -> Result<Vector> {
        Err(MatchError::Extraction {
            id: item.display().to_string(),
            reason: "no feature extractor configured".to_string(),
        })
    }
}
