//! Rolling per-(asset, metric) history of raw metric values.

use crate::{error::StoreError, metric::Metric, persist::JsonFileStore};
use derive_more::{Constructor, Display};
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

/// Maximum number of values retained per key.
pub const HISTORY_CAPACITY: usize = 180;

/// Number of most recent values used as the scoring baseline.
pub const SCORING_LOOKBACK: usize = 90;

/// Identifies one history window: an asset id paired with a metric.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Constructor)]
#[display("{asset}__{metric}")]
pub struct HistoryKey {
    pub asset: SmolStr,
    pub metric: Metric,
}

/// Bounded FIFO window of raw values, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Build a window from stored values, keeping only the newest `capacity`.
    pub fn from_values(capacity: usize, values: impl IntoIterator<Item = f64>) -> Self {
        let mut window = Self::new(capacity);
        values.into_iter().for_each(|value| window.push(value));
        window
    }

    /// Append the newest value, evicting from the front once over capacity.
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// The most recent `lookback` values, oldest first.
    pub fn recent(&self, lookback: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(lookback);
        self.values.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }
}

/// Durable store of [`HistoryWindow`]s.
///
/// Implementations never fail a read: a missing or unreadable key is a cold
/// start and yields an empty sequence.
pub trait HistoryStore: Send + Sync {
    /// Most recent `lookback` values for `key`, oldest first.
    fn load(&self, key: &HistoryKey, lookback: usize) -> Vec<f64>;

    /// Append `value` as the newest sample for `key`, evicting the oldest
    /// values beyond the store capacity. Durable once this returns `Ok`.
    fn append(&self, key: &HistoryKey, value: f64) -> Result<(), StoreError>;
}

/// [`HistoryStore`] persisting one JSON array per key.
///
/// `append` is a read-modify-write serialised within this process only.
/// Cycles from separate processes sharing the directory are kept apart by
/// [`Scheduler::with_lock_dir`](crate::scheduler::Scheduler::with_lock_dir).
#[derive(Debug)]
pub struct FileHistoryStore {
    files: Arc<JsonFileStore>,
    capacity: usize,
    append_lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(files: Arc<JsonFileStore>, capacity: usize) -> Self {
        Self {
            files,
            capacity,
            append_lock: Mutex::new(()),
        }
    }

    fn window(&self, key: &HistoryKey) -> HistoryWindow {
        let values: Vec<f64> = self.files.get_or(&key.to_string(), Vec::new());
        HistoryWindow::from_values(self.capacity, values)
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self, key: &HistoryKey, lookback: usize) -> Vec<f64> {
        self.window(key).recent(lookback)
    }

    fn append(&self, key: &HistoryKey, value: f64) -> Result<(), StoreError> {
        let _guard = self.append_lock.lock();
        let mut window = self.window(key);
        window.push(value);
        self.files.put(&key.to_string(), &window.recent(self.capacity))
    }
}

/// Volatile [`HistoryStore`], used when no durable directory is wanted.
#[derive(Debug)]
pub struct MemoryHistoryStore {
    capacity: usize,
    windows: Mutex<HashMap<HistoryKey, HistoryWindow>>,
}

impl MemoryHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self, key: &HistoryKey, lookback: usize) -> Vec<f64> {
        self.windows
            .lock()
            .get(key)
            .map(|window| window.recent(lookback))
            .unwrap_or_default()
    }

    fn append(&self, key: &HistoryKey, value: f64) -> Result<(), StoreError> {
        self.windows
            .lock()
            .entry(key.clone())
            .or_insert_with(|| HistoryWindow::new(self.capacity))
            .push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &std::path::Path) -> Arc<JsonFileStore> {
        Arc::new(JsonFileStore::open(dir).unwrap())
    }

    fn key() -> HistoryKey {
        HistoryKey::new("bitcoin".into(), Metric::EtfNetflow)
    }

    #[test]
    fn test_history_key_display() {
        assert_eq!(key().to_string(), "bitcoin__etf_netflow");
        assert_eq!(
            HistoryKey::new("ethereum".into(), Metric::ReserveChangePct).to_string(),
            "ethereum__reserve_change_pct"
        );
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = HistoryWindow::new(3);

        window.push(1.0);
        window.push(2.0);
        window.push(3.0);
        assert_eq!(window.len(), 3);

        window.push(4.0);
        assert_eq!(window.len(), 3);
        assert_eq!(window.recent(10), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.latest(), Some(4.0));
    }

    #[test]
    fn test_window_recent_lookback() {
        let window = HistoryWindow::from_values(10, (1..=6).map(f64::from));

        assert_eq!(window.recent(3), vec![4.0, 5.0, 6.0]);
        assert_eq!(window.recent(0), Vec::<f64>::new());
        assert_eq!(window.recent(100).len(), 6);
    }

    #[test]
    fn test_window_from_values_truncates_to_capacity() {
        let window = HistoryWindow::from_values(2, [1.0, 2.0, 3.0]);
        assert_eq!(window.recent(2), vec![2.0, 3.0]);
        assert_eq!(window.capacity(), 2);
    }

    #[test]
    fn test_memory_store_cold_start_is_empty() {
        let store = MemoryHistoryStore::default();
        assert!(store.load(&key(), SCORING_LOOKBACK).is_empty());
    }

    #[test]
    fn test_memory_store_never_exceeds_capacity() {
        let store = MemoryHistoryStore::default();
        for i in 0..1000 {
            store.append(&key(), i as f64).unwrap();
        }

        let values = store.load(&key(), 1000);
        assert_eq!(values.len(), HISTORY_CAPACITY);
        let expected: Vec<f64> = (820..1000).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_file_store_never_exceeds_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(open(dir.path()), HISTORY_CAPACITY);

        for i in 0..400 {
            store.append(&key(), i as f64).unwrap();
        }

        let values = store.load(&key(), 400);
        let expected: Vec<f64> = (220..400).map(|i| i as f64).collect();
        assert_eq!(values, expected);
        assert_eq!(store.load(&key(), SCORING_LOOKBACK).len(), SCORING_LOOKBACK);
        assert_eq!(store.load(&key(), SCORING_LOOKBACK)[0], 310.0);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileHistoryStore::new(open(dir.path()), 5);
            store.append(&key(), 1.5).unwrap();
            store.append(&key(), 2.5).unwrap();
        }

        let store = FileHistoryStore::new(open(dir.path()), 5);
        assert_eq!(store.load(&key(), 90), vec![1.5, 2.5]);
        assert!(dir.path().join("bitcoin__etf_netflow.json").is_file());
    }

    #[test]
    fn test_file_store_corrupt_key_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(open(dir.path()), 5);
        let other = HistoryKey::new("bitcoin".into(), Metric::FundingRate);

        store.append(&other, 0.01).unwrap();
        std::fs::write(dir.path().join("bitcoin__etf_netflow.json"), "not json").unwrap();

        assert!(store.load(&key(), 90).is_empty());
        assert_eq!(store.load(&other, 90), vec![0.01]);

        store.append(&key(), 9.0).unwrap();
        assert_eq!(store.load(&key(), 90), vec![9.0]);
    }
}
