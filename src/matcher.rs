//! Brute-force nearest-neighbor matching: O(n) scan over a reference set

use crate::cache::FeatureCache;
use crate::distance;
use crate::error::{MatchError, Result};
use crate::label::LabelExtractor;
use crate::vector::Vector;
use rand::Rng;
use serde::Serialize;

/// Normalization constant for 64-component features from the default network.
pub const DEFAULT_CONFIDENCE_SCALE: f32 = 12.0;

/// Floor applied to every confidence score.
pub const MIN_CONFIDENCE: f32 = 0.01;

/// Label reported when there is nothing to match against.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Distance-derived score in `[MIN_CONFIDENCE, 1.0]`.
///
/// `max(0.01, 1 - distance / scale)`. This ranks matches; it is not a
/// probability, and `scale` has to be recalibrated for any other extractor or
/// feature dimension.
pub fn confidence(distance: f32, scale: f32) -> f32 {
    (1.0 - distance / scale).max(MIN_CONFIDENCE)
}

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub label: String,
    /// Reference entry that won, `None` for the unknown result
    pub identifier: Option<String>,
    pub distance: f32,
    pub confidence: f32,
}

impl MatchResult {
    /// The defined "no match" outcome: unknown label, zero confidence.
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            identifier: None,
            distance: f32::INFINITY,
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.identifier.is_none()
    }
}

/// A borrowed view of (identifier, vector) pairs to scan, in a fixed order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet<'a> {
    entries: Vec<(&'a str, &'a Vector)>,
}

impl<'a> ReferenceSet<'a> {
    /// Every entry of the cache, in insertion order.
    pub fn full(cache: &'a FeatureCache) -> Self {
        Self {
            entries: cache.iter().collect(),
        }
    }

    /// Only the given identifiers, in the order given.
    pub fn from_ids<S: AsRef<str>>(cache: &'a FeatureCache, ids: &'a [S]) -> Result<Self> {
        let entries = ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                cache.get(id).map(|v| (id, v))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// A random subset of `size` entries (all of them if `size >= len`),
    /// keeping their relative order.
    pub fn sample<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> ReferenceSet<'a> {
        if size >= self.entries.len() {
            return self.clone();
        }
        let mut picked = rand::seq::index::sample(rng, self.entries.len(), size).into_vec();
        picked.sort_unstable();
        Self {
            entries: picked.into_iter().map(|i| self.entries[i]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Vector)> + '_ {
        self.entries.iter().copied()
    }
}

/// Finds the closest reference vector and scores it.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    labels: LabelExtractor,
    confidence_scale: f32,
}

impl Matcher {
    pub fn new(labels: LabelExtractor, confidence_scale: f32) -> Self {
        Self {
            labels,
            confidence_scale,
        }
    }

    pub fn labels(&self) -> &LabelExtractor {
        &self.labels
    }

    pub fn confidence_scale(&self) -> f32 {
        self.confidence_scale
    }

    /// Scan `reference` for the entry closest to `query` (Euclidean).
    ///
    /// On exact ties the first entry in the set's order wins. A query with a
    /// NaN or infinite component is rejected with `InvalidVector`.
    pub fn best_match(&self, query: &Vector, reference: &ReferenceSet<'_>) -> Result<MatchResult> {
        query.ensure_finite()?;
        let mut best: Option<(&str, f32)> = None;
        for (id, vector) in reference.iter() {
            let dist = distance::distance(query, vector)?;
            match best {
                Some((_, min)) if dist >= min => {}
                _ => best = Some((id, dist)),
            }
        }

        let (id, dist) = best.ok_or(MatchError::EmptyReferenceSet)?;
        Ok(MatchResult {
            label: self.labels.label(id),
            identifier: Some(id.to_string()),
            distance: dist,
            confidence: confidence(dist, self.confidence_scale),
        })
    }

    /// Like [`best_match`](Self::best_match), but an empty reference set yields
    /// [`MatchResult::unknown`] instead of an error.
    pub fn match_or_unknown(&self, query: &Vector, reference: &ReferenceSet<'_>) -> Result<MatchResult> {
        match self.best_match(query, reference) {
            Err(MatchError::EmptyReferenceSet) => Ok(MatchResult::unknown()),
            other => other,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(LabelExtractor::default(), DEFAULT_CONFIDENCE_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::rng_from_seed;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn cache_of(entries: &[(&str, Vec<f32>)]) -> FeatureCache {
        let dim = entries.first().map(|(_, v)| v.len()).unwrap_or(2);
        let mut cache = FeatureCache::new(dim);
        for (id, data) in entries {
            cache.insert(*id, Vector::new(data.clone())).unwrap();
        }
        cache
    }

    #[test]
    fn test_two_label_scenario() {
        let cache = cache_of(&[("a_1", vec![0.0, 0.0]), ("b_1", vec![10.0, 10.0])]);
        let result = Matcher::default()
            .best_match(&Vector::new(vec![1.0, 1.0]), &ReferenceSet::full(&cache))
            .unwrap();

        assert_eq!(result.label, "a");
        assert_eq!(result.identifier.as_deref(), Some("a_1"));
        assert_relative_eq!(result.distance, 1.414_213_5, epsilon = 1e-5);
        assert_relative_eq!(result.confidence, 0.882_149, epsilon = 1e-4);
    }

    #[test]
    fn test_empty_reference_set() {
        let cache = FeatureCache::new(2);
        let result = Matcher::default().best_match(&Vector::new(vec![1.0, 1.0]), &ReferenceSet::full(&cache));
        assert!(matches!(result, Err(MatchError::EmptyReferenceSet)));
    }

    #[test]
    fn test_match_or_unknown() {
        let cache = FeatureCache::new(2);
        let result = Matcher::default()
            .match_or_unknown(&Vector::new(vec![1.0, 1.0]), &ReferenceSet::full(&cache))
            .unwrap();
        assert!(result.is_unknown());
        assert_eq!(result.label, UNKNOWN_LABEL);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_tie_goes_to_first_entry() {
        let cache = cache_of(&[("left_1", vec![-1.0, 0.0]), ("right_1", vec![1.0, 0.0])]);
        let result = Matcher::default()
            .best_match(&Vector::new(vec![0.0, 0.0]), &ReferenceSet::full(&cache))
            .unwrap();
        assert_eq!(result.label, "left");
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let cache = cache_of(&[("a_1", vec![0.0, 0.0])]);
        let result = Matcher::default().best_match(&Vector::new(vec![1.0]), &ReferenceSet::full(&cache));
        assert!(matches!(result, Err(MatchError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_non_finite_query_is_rejected() {
        let cache = cache_of(&[("a_1", vec![0.0, 0.0]), ("b_1", vec![10.0, 10.0])]);
        let result = Matcher::default().best_match(&Vector::new(vec![f32::NAN, 0.0]), &ReferenceSet::full(&cache));
        assert!(matches!(result, Err(MatchError::InvalidVector { .. })));
    }

    #[test]
    fn test_from_ids_restricts_reference() {
        let cache = cache_of(&[("a_1", vec![0.0, 0.0]), ("b_1", vec![1.0, 1.0])]);
        let ids = vec!["b_1".to_string()];
        let reference = ReferenceSet::from_ids(&cache, &ids).unwrap();
        let result = Matcher::default().best_match(&Vector::new(vec![0.0, 0.0]), &reference).unwrap();
        assert_eq!(result.label, "b");

        let missing = vec!["zzz_1".to_string()];
        assert!(matches!(
            ReferenceSet::from_ids(&cache, &missing),
            Err(MatchError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_sample_keeps_order_and_size() {
        let entries: Vec<(String, Vec<f32>)> = (0..20).map(|i| (format!("x_{:02}", i), vec![i as f32])).collect();
        let mut cache = FeatureCache::new(1);
        for (id, data) in &entries {
            cache.insert(id.as_str(), Vector::new(data.clone())).unwrap();
        }
        let full = ReferenceSet::full(&cache);
        let sample = full.sample(5, &mut rng_from_seed(Some(3)));

        assert_eq!(sample.len(), 5);
        let ids: Vec<&str> = sample.iter().map(|(id, _)| id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        assert_eq!(full.sample(100, &mut rng_from_seed(Some(3))).len(), 20);
    }

    #[test]
    fn test_confidence_values() {
        assert_relative_eq!(confidence(0.0, 12.0), 1.0);
        assert_relative_eq!(confidence(6.0, 12.0), 0.5);
        assert_relative_eq!(confidence(12.0, 12.0), MIN_CONFIDENCE);
        assert_relative_eq!(confidence(500.0, 12.0), MIN_CONFIDENCE);
    }

    proptest! {
        #[test]
        fn prop_confidence_bounds(distance in 0.0f32..1000.0) {
            let c = confidence(distance, DEFAULT_CONFIDENCE_SCALE);
            prop_assert!((MIN_CONFIDENCE..=1.0).contains(&c));
        }

        #[test]
        fn prop_confidence_decreasing_below_scale(a in 0.0f32..11.8, b in 0.0f32..11.8) {
            prop_assume!((a - b).abs() > 1e-3);
            let (near, far) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(confidence(near, 12.0) > confidence(far, 12.0));
        }

        #[test]
        fn prop_best_match_is_minimum(
            refs in proptest::collection::vec(proptest::collection::vec(-10.0f32..10.0, 3), 1..30),
            query in proptest::collection::vec(-10.0f32..10.0, 3),
        ) {
            let mut cache = FeatureCache::new(3);
            for (i, data) in refs.iter().enumerate() {
                cache.insert(format!("label{}_{}", i % 4, i), Vector::new(data.clone())).unwrap();
            }
            let query = Vector::new(query);
            let result = Matcher::default().best_match(&query, &ReferenceSet::full(&cache)).unwrap();

            let min = cache
                .iter()
                .map(|(_, v)| distance::euclidean_distance(&query, v))
                .fold(f32::INFINITY, f32::min);
            prop_assert_eq!(result.distance, min);

            let winner = result.identifier.clone().unwrap();
            prop_assert_eq!(distance::euclidean_distance(&query, cache.get(&winner).unwrap()), min);
            prop_assert_eq!(result.label, LabelExtractor::default().label(&winner));
        }
    }
}
