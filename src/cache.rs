//! Feature cache: identifier -> vector, built incrementally and persisted as
//! one blob.
//!
//! A [`FeatureCache`] is a plain in-memory snapshot. It is write-once per key
//! and never shrinks. [`FeatureCacheStore`] owns the on-disk location and the
//! fixed dimension, and produces new snapshots when the cache is extended.

use crate::error::{MatchError, Result};
use crate::extractor::{extract_or_zero, FeatureExtractor};
use crate::persistence::serialization::{CacheSnapshot, SerializedVector};
use crate::persistence::snapshot::SnapshotFile;
use crate::vector::Vector;
use std::collections::HashMap;
use std::path::Path;

/// Progress is logged every this many items by default.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// In-memory mapping from identifier to feature vector.
///
/// Iteration follows insertion order, which is also the order persisted to
/// disk and the order the matcher scans.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCache {
    dimension: usize,
    entries: Vec<(String, Vector)>,
    /// Identifier -> position in `entries`
    positions: HashMap<String, usize>,
}

impl FeatureCache {
    /// Create an empty cache for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Insert a vector under `id`.
    ///
    /// Returns `false` without touching the cache when `id` is already present.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vector) -> Result<bool> {
        let id = id.into();
        if vector.dimension() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }
        if self.positions.contains_key(&id) {
            return Ok(false);
        }

        self.positions.insert(id.clone(), self.entries.len());
        self.entries.push((id, vector));
        Ok(true)
    }

    /// Get the vector cached for `id`.
    pub fn get(&self, id: &str) -> Result<&Vector> {
        self.positions
            .get(id)
            .map(|&pos| &self.entries[pos].1)
            .ok_or_else(|| MatchError::KeyNotFound { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// (identifier, vector) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Vector)> {
        self.entries.iter().map(|(id, v)| (id.as_str(), v))
    }

    /// Convert to the serializable form.
    pub fn to_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            dimension: self.dimension,
            vectors: self
                .entries
                .iter()
                .map(|(id, v)| SerializedVector {
                    id: id.clone(),
                    data: v.as_slice().to_vec(),
                })
                .collect(),
        }
    }

    /// Rebuild a cache from its serialized form, re-checking every dimension.
    pub fn from_snapshot(snapshot: CacheSnapshot) -> Result<Self> {
        let mut cache = FeatureCache::new(snapshot.dimension);
        for sv in snapshot.vectors {
            cache.insert(sv.id, Vector::new(sv.data))?;
        }
        Ok(cache)
    }
}

/// Summary of one `build_or_update` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Identifiers offered to the build.
    pub requested: usize,
    /// Identifiers that were already cached.
    pub skipped: usize,
    /// Identifiers newly extracted and inserted.
    pub extracted: usize,
}

/// The persisted feature cache at a fixed path with a fixed dimension.
#[derive(Debug, Clone)]
pub struct FeatureCacheStore {
    file: SnapshotFile,
    dimension: usize,
    progress_interval: usize,
}

impl FeatureCacheStore {
    pub fn new(path: impl AsRef<Path>, dimension: usize) -> Self {
        Self {
            file: SnapshotFile::new(path),
            dimension,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Log build progress every `interval` items (0 disables it).
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Load the persisted cache. `None` means no cache file exists yet.
    ///
    /// A blob written with a different dimension is rejected; delete the file
    /// to rebuild it.
    pub fn load(&self) -> Result<Option<FeatureCache>> {
        let Some(snapshot) = self.file.load()? else {
            return Ok(None);
        };
        if snapshot.dimension != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: snapshot.dimension,
            });
        }
        let cache = FeatureCache::from_snapshot(snapshot)?;
        tracing::info!("Loaded feature cache {} ({} entries)", self.path().display(), cache.len());
        Ok(Some(cache))
    }

    /// Load the persisted cache, failing with `CacheMissing` if it is absent.
    pub fn load_required(&self) -> Result<FeatureCache> {
        self.load()?.ok_or_else(|| MatchError::CacheMissing {
            path: self.path().to_path_buf(),
        })
    }

    /// Load the persisted cache, or start an empty one.
    pub fn load_or_empty(&self) -> Result<FeatureCache> {
        Ok(self
            .load()?
            .unwrap_or_else(|| FeatureCache::new(self.dimension)))
    }

    /// Load the persisted cache, or build it from `ids` when no file exists.
    ///
    /// An existing cache is returned as is, without extracting anything.
    pub fn load_or_build<I, S, E>(&self, ids: I, extractor: &E) -> Result<FeatureCache>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: FeatureExtractor + ?Sized,
    {
        if let Some(cache) = self.load()? {
            return Ok(cache);
        }
        tracing::info!("No feature cache at {}, building it", self.path().display());
        let (cache, _) = self.build_or_update(&FeatureCache::new(self.dimension), ids, extractor)?;
        Ok(cache)
    }

    /// Write the full cache in one go.
    pub fn save(&self, cache: &FeatureCache) -> Result<()> {
        if cache.dimension() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: cache.dimension(),
            });
        }
        self.file.save(&cache.to_snapshot())
    }

    /// Extract every identifier missing from `cache`, persist the result and
    /// return it as a new snapshot. `cache` itself is left untouched.
    ///
    /// Identifiers are paths handed to `extractor`. Failed extractions are
    /// cached as zero vectors; only persistence errors are returned.
    pub fn build_or_update<I, S, E>(
        &self,
        cache: &FeatureCache,
        ids: I,
        extractor: &E,
    ) -> Result<(FeatureCache, BuildStats)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: FeatureExtractor + ?Sized,
    {
        let ids: Vec<S> = ids.into_iter().collect();
        let total = ids.len();
        let mut next = cache.clone();
        let mut stats = BuildStats {
            requested: total,
            ..BuildStats::default()
        };

        tracing::info!(
            "Updating feature cache {} ({} cached, {} requested)",
            self.path().display(),
            cache.len(),
            total
        );

        for (i, id) in ids.iter().enumerate() {
            if self.progress_interval > 0 && i % self.progress_interval == 0 {
                tracing::info!("processed {}/{}", i, total);
            }

            let id = id.as_ref();
            if next.contains(id) {
                stats.skipped += 1;
                continue;
            }
            let vector = extract_or_zero(extractor, Path::new(id), self.dimension);
            next.insert(id, vector)?;
            stats.extracted += 1;
        }

        self.save(&next)?;
        tracing::info!(
            "Feature cache saved: {} entries ({} new, {} skipped)",
            next.len(),
            stats.extracted,
            stats.skipped
        );
        Ok((next, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn fake_extractor(item: &Path) -> Result<Vector> {
        let name = item.display().to_string();
        let seed = name.bytes().map(|b| b as f32).sum::<f32>();
        Ok(Vector::new(vec![seed, seed / 2.0, 1.0, 0.0]))
    }

    #[test]
    fn test_insert_is_write_once() {
        let mut cache = FeatureCache::new(2);
        assert!(cache.insert("a_1", Vector::new(vec![1.0, 1.0])).unwrap());
        assert!(!cache.insert("a_1", Vector::new(vec![9.0, 9.0])).unwrap());
        assert_eq!(cache.get("a_1").unwrap().as_slice(), &[1.0, 1.0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_dimension_mismatch() {
        let mut cache = FeatureCache::new(2);
        let result = cache.insert("a_1", Vector::new(vec![1.0]));
        assert!(matches!(result, Err(MatchError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_get_missing_key() {
        let cache = FeatureCache::new(2);
        assert!(matches!(cache.get("nope"), Err(MatchError::KeyNotFound { .. })));
    }

    #[test]
    fn test_iteration_order() {
        let mut cache = FeatureCache::new(1);
        for id in ["c_1", "a_1", "b_1"] {
            cache.insert(id, Vector::new(vec![0.0])).unwrap();
        }
        let ids: Vec<&str> = cache.ids().collect();
        assert_eq!(ids, vec!["c_1", "a_1", "b_1"]);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FeatureCacheStore::new(dir.path().join("cache.bin"), 4);
        assert!(store.load().unwrap().is_none());
        assert!(matches!(store.load_required(), Err(MatchError::CacheMissing { .. })));
        assert!(store.load_or_empty().unwrap().is_empty());
    }

    #[test]
    fn test_build_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let store = FeatureCacheStore::new(dir.path().join("cache.bin"), 2);
        let empty = store.load_or_empty().unwrap();

        let (cache, stats) = store
            .build_or_update(&empty, ["poodle_01", "poodle_02", "beagle_01"], &fake_extractor)
            .unwrap();
        assert_eq!(stats.extracted, 3);
        assert_eq!(cache.dimension(), 2);
        assert!(empty.is_empty());

        let loaded = store.load_required().unwrap();
        assert_eq!(loaded, cache);
    }

    #[test]
    fn test_build_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FeatureCacheStore::new(dir.path().join("cache.bin"), 2);
        let ids = ["a_1", "a_2", "b_1"];

        let (once, _) = store
            .build_or_update(&FeatureCache::new(2), ids, &fake_extractor)
            .unwrap();
        let (twice, stats) = store.build_or_update(&once, ids, &fake_extractor).unwrap();

        assert_eq!(once, twice);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.extracted, 0);
    }

    #[test]
    fn test_build_skips_cached_ids() {
        let dir = TempDir::new().unwrap();
        let store = FeatureCacheStore::new(dir.path().join("cache.bin"), 2);
        let calls = Cell::new(0);
        let counting = |item: &Path| -> Result<Vector> {
            calls.set(calls.get() + 1);
            fake_extractor(item)
        };

        let (cache, _) = store
            .build_or_update(&FeatureCache::new(2), ["a_1", "a_1", "b_1"], &counting)
            .unwrap();
        assert_eq!(calls.get(), 2);

        store.build_or_update(&cache, ["a_1", "b_1", "c_1"], &counting).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_build_substitutes_zero_vector() {
        let dir = TempDir::new().unwrap();
        let store = FeatureCacheStore::new(dir.path().join("cache.bin"), 3);
        let flaky = |item: &Path| -> Result<Vector> {
            if item.to_string_lossy().contains("broken") {
                Err(MatchError::Extraction {
                    id: item.display().to_string(),
                    reason: "unreadable".to_string(),
                })
            } else {
                Ok(Vector::new(vec![1.0, 2.0, 3.0]))
            }
        };

        let (cache, stats) = store
            .build_or_update(&FeatureCache::new(3), ["ok_1", "broken_1"], &flaky)
            .unwrap();
        assert_eq!(stats.extracted, 2);
        assert!(cache.get("broken_1").unwrap().is_zero());
        assert!(!cache.get("ok_1").unwrap().is_zero());
    }

    #[test]
    fn test_load_or_build_only_builds_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = FeatureCacheStore::new(dir.path().join("cache.bin"), 2);
        let calls = Cell::new(0);
        let counting = |item: &Path| -> Result<Vector> {
            calls.set(calls.get() + 1);
            fake_extractor(item)
        };

        let built = store.load_or_build(["a_1", "b_1"], &counting).unwrap();
        assert_eq!(built.len(), 2);
        assert_eq!(calls.get(), 2);

        let loaded = store.load_or_build(["a_1", "b_1", "c_1"], &counting).unwrap();
        assert_eq!(loaded, built);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_load_rejects_other_dimension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.bin");
        FeatureCacheStore::new(&path, 2)
            .build_or_update(&FeatureCache::new(2), ["a_1"], &fake_extractor)
            .unwrap();

        let result = FeatureCacheStore::new(&path, 64).load();
        assert!(matches!(
            result,
            Err(MatchError::DimensionMismatch { expected: 64, actual: 2 })
        ));
    }

    #[test]
    fn test_save_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();
        let store = FeatureCacheStore::new(blocker.join("cache.bin"), 2);

        let result = store.save(&FeatureCache::new(2));
        assert!(matches!(result, Err(MatchError::IoError(_))));
    }
}
