//! Held-out evaluation: split the cached identifiers, match every test item
//! against the train partition only, and report accuracy.

use crate::cache::{FeatureCache, FeatureCacheStore};
use crate::error::Result;
use crate::extractor::FeatureExtractor;
use crate::matcher::{Matcher, ReferenceSet};
use crate::split::{ratio_split, rng_from_seed, tail_split, Split, SplitPolicy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Where an evaluation run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingCache,
    Splitting,
    Scoring,
    Reported,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::LoadingCache => "loading cache",
            Phase::Splitting => "splitting",
            Phase::Scoring => "scoring",
            Phase::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// One scored test item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub id: String,
    pub true_label: String,
    pub predicted_label: String,
    pub distance: f32,
}

impl Prediction {
    pub fn is_correct(&self) -> bool {
        self.true_label == self.predicted_label
    }
}

/// Per-label tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelStats {
    pub correct: usize,
    pub total: usize,
}

impl LabelStats {
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct, self.total)
    }
}

/// Final output of an evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub correct: usize,
    pub total: usize,
    pub train_size: usize,
    /// Labels left out of a tail split because they were too small
    pub excluded_labels: Vec<String>,
    pub predictions: Vec<Prediction>,
}

impl EvaluationReport {
    /// `100 * correct / total`, or 0 when nothing was tested.
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct, self.total)
    }

    pub fn wrong(&self) -> usize {
        self.total - self.correct
    }

    /// `(true_label, predicted_label)` in scoring order.
    pub fn label_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.predictions
            .iter()
            .map(|p| (p.true_label.as_str(), p.predicted_label.as_str()))
    }

    /// Tally by true label.
    pub fn per_label(&self) -> BTreeMap<String, LabelStats> {
        let mut stats: BTreeMap<String, LabelStats> = BTreeMap::new();
        for p in &self.predictions {
            let entry = stats.entry(p.true_label.clone()).or_default();
            entry.total += 1;
            if p.is_correct() {
                entry.correct += 1;
            }
        }
        stats
    }
}

fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * correct as f64 / total as f64
}

/// Drives split -> match -> tally for one policy.
#[derive(Debug)]
pub struct Evaluator {
    matcher: Matcher,
    policy: SplitPolicy,
    progress_interval: usize,
    phase: Phase,
}

impl Evaluator {
    pub fn new(matcher: Matcher, policy: SplitPolicy) -> Self {
        Self {
            matcher,
            policy,
            progress_interval: crate::cache::DEFAULT_PROGRESS_INTERVAL,
            phase: Phase::Idle,
        }
    }

    /// Log scoring progress every `interval` items (0 disables it).
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!("evaluation: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Evaluate over every identifier already in `cache`.
    pub fn run(&mut self, cache: &FeatureCache) -> Result<EvaluationReport> {
        self.enter(Phase::Splitting);
        let (split, excluded) = self.split(cache.ids())?;
        self.score(cache, &split, excluded)
    }

    /// Load the persisted cache and evaluate over its identifiers.
    pub fn run_from_store(&mut self, store: &FeatureCacheStore) -> Result<EvaluationReport> {
        self.enter(Phase::LoadingCache);
        let cache = store.load_required()?;
        self.run(&cache)
    }

    /// Evaluate over `items`, first extending the persisted cache so it covers
    /// both partitions.
    pub fn run_on_items<E: FeatureExtractor + ?Sized>(
        &mut self,
        store: &FeatureCacheStore,
        items: &[String],
        extractor: &E,
    ) -> Result<EvaluationReport> {
        self.enter(Phase::LoadingCache);
        let cache = store.load_or_empty()?;

        self.enter(Phase::Splitting);
        let (split, excluded) = self.split(items.iter().map(String::as_str))?;
        let needed = split.train.iter().chain(split.test.iter());
        let (cache, _) = store.build_or_update(&cache, needed, extractor)?;

        self.score(&cache, &split, excluded)
    }

    fn split<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Result<(Split, Vec<String>)> {
        match self.policy {
            SplitPolicy::Ratio { test_fraction, seed } => {
                let split = ratio_split(ids, test_fraction, &mut rng_from_seed(seed))?;
                Ok((split, Vec::new()))
            }
            SplitPolicy::Tail { k } => {
                let tail = tail_split(ids, self.matcher.labels(), k);
                let excluded = tail.excluded.keys().cloned().collect();
                Ok((tail.into_split(), excluded))
            }
        }
    }

    fn score(&mut self, cache: &FeatureCache, split: &Split, excluded_labels: Vec<String>) -> Result<EvaluationReport> {
        tracing::info!(
            "Train (reference): {} | Test (queries): {} | Excluded labels: {}",
            split.train.len(),
            split.test.len(),
            excluded_labels.len()
        );

        self.enter(Phase::Scoring);
        let reference = ReferenceSet::from_ids(cache, &split.train)?;
        let labels = *self.matcher.labels();
        let mut report = EvaluationReport {
            train_size: split.train.len(),
            excluded_labels,
            ..EvaluationReport::default()
        };

        for (i, id) in split.test.iter().enumerate() {
            let query = cache.get(id)?;
            let result = self.matcher.best_match(query, &reference)?;
            let prediction = Prediction {
                id: id.clone(),
                true_label: labels.label(id),
                predicted_label: result.label,
                distance: result.distance,
            };

            report.total += 1;
            if prediction.is_correct() {
                report.correct += 1;
            }
            report.predictions.push(prediction);

            if self.progress_interval > 0 && (i + 1) % self.progress_interval == 0 {
                tracing::info!(
                    "Processed {}/{} (running accuracy {:.1}%)",
                    i + 1,
                    split.test.len(),
                    report.accuracy()
                );
            }
        }

        self.enter(Phase::Reported);
        tracing::info!(
            "Accuracy {:.2}% ({} correct, {} wrong)",
            report.accuracy(),
            report.correct,
            report.wrong()
        );
        Ok(report)
    }
}
