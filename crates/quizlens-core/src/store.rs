//! Typed key-value persistence for the three local collections:
//! search history, favorites and usage statistics.
//!
//! Each collection is one self-contained JSON document under the data
//! directory. Reads never fail: a missing or corrupt document is treated as
//! the empty/default value. Writes can fail with [`StoreError::Unavailable`];
//! callers treat that as non-fatal and continue with in-memory state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::HISTORY_CAP;

/// Counter name bumped once per completed search.
pub const STAT_SEARCH_COUNT: &str = "search_count";

#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying medium rejected the write (quota, permissions, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// One completed search, newest first in the history document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Creation timestamp in ms, unique and strictly monotonic.
    pub id: u64,
    pub timestamp: u64,
    #[serde(default)]
    pub source_label: String,
    #[serde(default)]
    pub result_count: usize,
    /// May be empty when no college filter was applied.
    #[serde(default)]
    pub college: String,
}

/// A result the user marked as favorite. Keyed by `question_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub question_id: String,
    pub timestamp: u64,
    #[serde(default)]
    pub answer_snapshot: String,
    #[serde(default)]
    pub category: String,
}

/// An open map of named counters plus the last search time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub last_search_time: u64,
    #[serde(flatten)]
    pub counters: BTreeMap<String, u64>,
}

impl UsageStats {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn search_count(&self) -> u64 {
        self.counter(STAT_SEARCH_COUNT)
    }
}

/// File-backed store for the three collections. All access is
/// read-modify-write of the whole document; collections are independent.
#[derive(Debug, Clone)]
pub struct PersistentStore {
    dir: PathBuf,
}

impl PersistentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // --- history ---

    /// All history entries, newest first. Never fails.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.read_doc("history.json")
    }

    /// Append one completed search. Evicts the oldest entry past the cap.
    pub fn push_history(
        &self,
        source_label: &str,
        result_count: usize,
        college: &str,
    ) -> Result<HistoryEntry, StoreError> {
        let mut history = self.history();

        // Ids are creation ms; keep them strictly monotonic even when two
        // searches land in the same millisecond.
        let mut id = now_ms();
        if let Some(newest) = history.first() {
            if id <= newest.id {
                id = newest.id + 1;
            }
        }

        let entry = HistoryEntry {
            id,
            timestamp: now_ms(),
            source_label: source_label.to_string(),
            result_count,
            college: college.to_string(),
        };

        history.insert(0, entry.clone());
        history.truncate(HISTORY_CAP);
        self.write_doc("history.json", &history)?;
        Ok(entry)
    }

    /// Delete a single entry by id. Returns whether it existed.
    pub fn delete_history(&self, id: u64) -> Result<bool, StoreError> {
        let mut history = self.history();
        let before = history.len();
        history.retain(|h| h.id != id);
        if history.len() == before {
            return Ok(false);
        }
        self.write_doc("history.json", &history)?;
        Ok(true)
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.write_doc("history.json", &Vec::<HistoryEntry>::new())
    }

    // --- favorites ---

    /// All favorites, insertion order. Never fails.
    pub fn favorites(&self) -> Vec<FavoriteEntry> {
        self.read_doc("favorites.json")
    }

    /// Toggle presence of a question in the favorites. Marking an
    /// already-favorited id removes it. Returns whether it is now present.
    pub fn toggle_favorite(
        &self,
        question_id: &str,
        answer_snapshot: &str,
        category: &str,
    ) -> Result<bool, StoreError> {
        let mut favorites = self.favorites();
        let before = favorites.len();
        favorites.retain(|f| f.question_id != question_id);

        let now_present = if favorites.len() == before {
            favorites.push(FavoriteEntry {
                question_id: question_id.to_string(),
                timestamp: now_ms(),
                answer_snapshot: answer_snapshot.to_string(),
                category: category.to_string(),
            });
            true
        } else {
            false
        };

        self.write_doc("favorites.json", &favorites)?;
        Ok(now_present)
    }

    /// Remove a favorite by id. Returns whether it existed.
    pub fn remove_favorite(&self, question_id: &str) -> Result<bool, StoreError> {
        let mut favorites = self.favorites();
        let before = favorites.len();
        favorites.retain(|f| f.question_id != question_id);
        if favorites.len() == before {
            return Ok(false);
        }
        self.write_doc("favorites.json", &favorites)?;
        Ok(true)
    }

    // --- stats ---

    /// Current usage statistics. Never fails.
    pub fn stats(&self) -> UsageStats {
        self.read_doc("stats.json")
    }

    /// Increment a named counter by exactly 1 and overwrite
    /// `last_search_time`. Returns the new counter value.
    pub fn bump_stat(&self, name: &str) -> Result<u64, StoreError> {
        let mut stats = self.stats();
        let value = stats.counter(name) + 1;
        stats.counters.insert(name.to_string(), value);
        stats.last_search_time = now_ms();
        self.write_doc("stats.json", &stats)?;
        Ok(value)
    }

    // --- document access ---

    fn read_doc<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        let path = self.dir.join(file);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return T::default(),
        };
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt document, treating as empty");
                T::default()
            }
        }
    }

    fn write_doc<T: Serialize>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let content =
            serde_json::to_string_pretty(value).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        std::fs::write(self.dir.join(file), content)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, PersistentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn missing_documents_read_as_empty() {
        let (_dir, store) = temp_store();
        assert!(store.history().is_empty());
        assert!(store.favorites().is_empty());
        assert_eq!(store.stats().search_count(), 0);
    }

    #[test]
    fn corrupt_document_reads_as_empty() {
        let (dir, store) = temp_store();
        std::fs::write(dir.path().join("history.json"), "{not json").unwrap();
        assert!(store.history().is_empty());
    }

    #[test]
    fn history_is_newest_first_with_monotonic_ids() {
        let (_dir, store) = temp_store();
        let a = store.push_history("a.jpg", 3, "").unwrap();
        let b = store.push_history("b.jpg", 0, "计算机学院").unwrap();
        assert!(b.id > a.id);

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].source_label, "b.jpg");
        assert_eq!(history[0].result_count, 0);
        assert_eq!(history[0].college, "计算机学院");
        assert_eq!(history[1].source_label, "a.jpg");
    }

    #[test]
    fn history_evicts_oldest_past_cap() {
        let (_dir, store) = temp_store();
        for i in 0..HISTORY_CAP + 1 {
            store.push_history(&format!("img_{i}.png"), i, "").unwrap();
        }
        let history = store.history();
        assert_eq!(history.len(), HISTORY_CAP);
        // The very first entry is gone, the second oldest survives.
        assert_eq!(history.last().unwrap().source_label, "img_1.png");
        assert_eq!(history.first().unwrap().source_label, format!("img_{HISTORY_CAP}.png"));
    }

    #[test]
    fn delete_history_by_id() {
        let (_dir, store) = temp_store();
        let a = store.push_history("a.jpg", 1, "").unwrap();
        let b = store.push_history("b.jpg", 2, "").unwrap();
        assert!(store.delete_history(a.id).unwrap());
        assert!(!store.delete_history(a.id).unwrap());
        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, b.id);
    }

    #[test]
    fn clear_history_empties_the_collection() {
        let (_dir, store) = temp_store();
        store.push_history("a.jpg", 1, "").unwrap();
        store.clear_history().unwrap();
        assert!(store.history().is_empty());
    }

    #[test]
    fn favorite_toggle_round_trips() {
        let (_dir, store) = temp_store();
        assert!(store.toggle_favorite("q_7", "answer text", "高等数学").unwrap());
        let favorites = store.favorites();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].question_id, "q_7");
        assert_eq!(favorites[0].category, "高等数学");

        // Second toggle removes it again.
        assert!(!store.toggle_favorite("q_7", "answer text", "高等数学").unwrap());
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn remove_favorite_reports_presence() {
        let (_dir, store) = temp_store();
        store.toggle_favorite("q_1", "", "").unwrap();
        assert!(store.remove_favorite("q_1").unwrap());
        assert!(!store.remove_favorite("q_1").unwrap());
    }

    #[test]
    fn bump_stat_increments_and_stamps_time() {
        let (_dir, store) = temp_store();
        assert_eq!(store.bump_stat(STAT_SEARCH_COUNT).unwrap(), 1);
        assert_eq!(store.bump_stat(STAT_SEARCH_COUNT).unwrap(), 2);
        let stats = store.stats();
        assert_eq!(stats.search_count(), 2);
        assert!(stats.last_search_time > 0);
    }

    #[test]
    fn stats_document_is_an_open_counter_map() {
        let (dir, store) = temp_store();
        store.bump_stat("ai_ask_count").unwrap();
        store.bump_stat(STAT_SEARCH_COUNT).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("stats.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["ai_ask_count"], 1);
        assert_eq!(value["search_count"], 1);
    }
}
