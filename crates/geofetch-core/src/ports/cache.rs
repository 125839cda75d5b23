//! Local feature-cache port.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::feature::FeatureRecord;

/// Port over the locally cached feature store.
///
/// The real spatial cache engine is an external collaborator; the streaming
/// layer only needs generation-scoped reads and appends. Records appended
/// while a download runs are tagged with the generation that was current at
/// append time, so iterators can re-read exactly the population their query
/// subscribed to and ignore stale entries from earlier populations.
pub trait FeatureCache: Send + Sync {
    /// All records stored under `generation`, in insertion order.
    fn snapshot(&self, generation: u64) -> Vec<FeatureRecord>;

    /// Append records under the current generation.
    fn append(&self, records: &[FeatureRecord]);

    /// The current generation counter.
    fn generation(&self) -> u64;

    /// Invalidate existing cached features by advancing the generation.
    /// Returns the new generation.
    fn advance_generation(&self) -> u64;
}

/// In-memory [`FeatureCache`] used in tests and as a default store.
#[derive(Debug, Default)]
pub struct MemoryFeatureCache {
    records: Mutex<Vec<(u64, FeatureRecord)>>,
    generation: AtomicU64,
}

impl MemoryFeatureCache {
    /// Create an empty cache at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored across all generations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FeatureCache for MemoryFeatureCache {
    fn snapshot(&self, generation: u64) -> Vec<FeatureRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(tag, _)| *tag == generation)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn append(&self, records: &[FeatureRecord]) {
        let generation = self.generation();
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(records.iter().map(|r| (generation, r.clone())));
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;

    fn record(id: &str) -> FeatureRecord {
        FeatureRecord::new(Feature::default(), id)
    }

    #[test]
    fn snapshot_is_generation_scoped() {
        let cache = MemoryFeatureCache::new();
        cache.append(&[record("a"), record("b")]);

        let stale_generation = cache.generation();
        cache.advance_generation();
        cache.append(&[record("c")]);

        let stale: Vec<_> = cache
            .snapshot(stale_generation)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(stale, vec!["a", "b"]);

        let fresh: Vec<_> = cache
            .snapshot(cache.generation())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(fresh, vec!["c"]);
    }

    #[test]
    fn append_preserves_insertion_order() {
        let cache = MemoryFeatureCache::new();
        cache.append(&[record("1")]);
        cache.append(&[record("2"), record("3")]);

        let ids: Vec<_> = cache
            .snapshot(cache.generation())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
