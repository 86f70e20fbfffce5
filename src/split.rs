//! Train/test partitioning of cached identifiers.
//!
//! Two policies:
//! - [`ratio_split`]: global shuffle, then cut at `floor(n * (1 - test_fraction))`.
//!   Labels are not balanced.
//! - [`tail_split`]: per label, sort identifiers and hold out the last `k`.
//!   Labels with `k` or fewer members are excluded from both sides.
//!
//! Both return identifiers only; vectors stay in the cache.

use crate::error::{MatchError, Result};
use crate::label::LabelExtractor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Which partitioning policy to apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Shuffle and cut; `seed: None` draws a fresh split each run.
    Ratio { test_fraction: f64, seed: Option<u64> },
    /// Hold out the lexicographically last `k` identifiers of every label.
    Tail { k: usize },
}

/// Disjoint train and test identifier lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<String>,
    pub test: Vec<String>,
}

impl Split {
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a tail split, including the labels too small to test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailSplit {
    pub train: Vec<String>,
    pub test: Vec<String>,
    /// Label -> its identifiers, for every label with `size <= k`
    pub excluded: BTreeMap<String, Vec<String>>,
}

impl TailSplit {
    pub fn excluded_labels(&self) -> Vec<&str> {
        self.excluded.keys().map(String::as_str).collect()
    }

    /// Number of identifiers dropped with their label.
    pub fn excluded_count(&self) -> usize {
        self.excluded.values().map(Vec::len).sum()
    }

    pub fn into_split(self) -> Split {
        Split {
            train: self.train,
            test: self.test,
        }
    }
}

/// A seeded generator for reproducible splits, or an entropy-seeded one.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Shuffle `ids` with `rng` and cut off the trailing `test_fraction` as test.
///
/// The train side gets `floor(n * (1 - test_fraction))` identifiers and the
/// test side the remainder.
pub fn ratio_split<I, S, R>(ids: I, test_fraction: f64, rng: &mut R) -> Result<Split>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    R: Rng + ?Sized,
{
    if !(0.0..=1.0).contains(&test_fraction) {
        return Err(MatchError::InvalidConfig(format!(
            "test fraction must be within [0, 1], got {}",
            test_fraction
        )));
    }

    let mut all: Vec<String> = ids.into_iter().map(Into::into).collect();
    all.shuffle(rng);

    let cut = ((all.len() as f64) * (1.0 - test_fraction)).floor() as usize;
    let test = all.split_off(cut.min(all.len()));
    Ok(Split { train: all, test })
}

/// Group `ids` by label, sort each group and hold out its last `k` members.
///
/// Duplicate identifiers are counted once.
pub fn tail_split<I, S>(ids: I, labels: &LabelExtractor, k: usize) -> TailSplit
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for id in ids {
        let id = id.into();
        groups.entry(labels.label(&id)).or_default().insert(id);
    }

    let mut split = TailSplit::default();
    for (label, members) in groups {
        let mut members: Vec<String> = members.into_iter().collect();
        if members.len() <= k {
            tracing::warn!("{}: only {} samples, excluded from the split", label, members.len());
            split.excluded.insert(label, members);
            continue;
        }
        let held_out = members.split_off(members.len() - k);
        split.train.extend(members);
        split.test.extend(held_out);
    }
    split
}

/// Render the held-out listing: header, note, blank line, one id per line.
pub fn render_holdout_listing(test: &[String]) -> String {
    let mut out = format!("=== HELD-OUT TEST FILES (TOTAL: {}) ===\n", test.len());
    out.push_str("These files are not in the reference set; matching them will not return an exact hit.\n\n");
    for id in test {
        out.push_str(id);
        out.push('\n');
    }
    out
}

/// Write the held-out listing for `test` to `path`.
pub fn write_holdout_listing(path: impl AsRef<Path>, test: &[String]) -> Result<()> {
    fs::write(path, render_holdout_listing(test))?;
    Ok(())
}
