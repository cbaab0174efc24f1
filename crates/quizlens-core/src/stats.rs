//! Read-side display counters derived from the persistent store.

use crate::store::PersistentStore;

/// Counters shown in the stats panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub search_count: u64,
    pub favorite_count: usize,
    pub history_count: usize,
}

/// Pure read-side view over the store. No caching: every snapshot reflects
/// the store state at call time.
pub struct StatsAggregator {
    store: PersistentStore,
}

impl StatsAggregator {
    pub fn new(store: PersistentStore) -> Self {
        Self { store }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            search_count: self.store.stats().search_count(),
            favorite_count: self.store.favorites().len(),
            history_count: self.store.history().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::STAT_SEARCH_COUNT;
    use crate::HISTORY_CAP;

    #[test]
    fn snapshot_reflects_store_at_call_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(dir.path());
        let aggregator = StatsAggregator::new(store.clone());

        assert_eq!(
            aggregator.snapshot(),
            StatsSnapshot {
                search_count: 0,
                favorite_count: 0,
                history_count: 0
            }
        );

        store.push_history("a.jpg", 2, "").unwrap();
        store.bump_stat(STAT_SEARCH_COUNT).unwrap();
        store.toggle_favorite("q_1", "", "").unwrap();

        let snap = aggregator.snapshot();
        assert_eq!(snap.search_count, 1);
        assert_eq!(snap.favorite_count, 1);
        assert_eq!(snap.history_count, 1);
    }

    #[test]
    fn history_count_is_the_capped_view() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(dir.path());
        let aggregator = StatsAggregator::new(store.clone());

        for i in 0..HISTORY_CAP + 5 {
            store.push_history(&format!("{i}.png"), 0, "").unwrap();
        }
        let snap = aggregator.snapshot();
        assert_eq!(snap.history_count, HISTORY_CAP);
        // The search counter keeps counting past the cap.
        assert_eq!(snap.search_count, 0);
    }
}
