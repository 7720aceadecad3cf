//! Per-cycle check records, alert events and the "last run" snapshot.

use crate::{
    classify::{AlertKind, AlertState},
    error::StoreError,
    metric::MetricSnapshot,
    persist::JsonFileStore,
    score::ScoreResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;

/// One asset's full outcome for a cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckRecord {
    pub time: DateTime<Utc>,
    pub symbol: SmolStr,
    /// USD price, `None` if the price fetch failed.
    pub price: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    pub metrics: MetricSnapshot,
    #[serde(flatten)]
    pub score: ScoreResult,
    pub state: AlertState,
}

/// A threshold crossing raised by a [`CheckRecord`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub record: CheckRecord,
}

/// The most recent cycle's records and the alerts they raised.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LastRun {
    pub time: DateTime<Utc>,
    pub results: Vec<CheckRecord>,
    pub alerts: Vec<AlertEvent>,
}

/// Durable holder of the single [`LastRun`] snapshot.
#[derive(Debug, Clone)]
pub struct LastRunStore {
    files: Arc<JsonFileStore>,
}

impl LastRunStore {
    const KEY: &'static str = "last_run";

    pub fn new(files: Arc<JsonFileStore>) -> Self {
        Self { files }
    }

    /// The stored snapshot, `None` before the first cycle or if unreadable.
    pub fn load(&self) -> Option<LastRun> {
        self.files.get(Self::KEY)
    }

    /// Replace the stored snapshot wholesale.
    pub fn save(&self, last_run: &LastRun) -> Result<(), StoreError> {
        self.files.put(Self::KEY, last_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Metric;
    use std::collections::BTreeMap;

    fn record(symbol: &str, score: f64, state: AlertState) -> CheckRecord {
        CheckRecord {
            time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            symbol: symbol.into(),
            price: None,
            price_change_24h_pct: Some(-2.5),
            metrics: Metric::ALL.iter().map(|m| (*m, 0.0)).collect(),
            score: ScoreResult {
                score,
                z: Metric::ALL.iter().map(|m| (*m, 0.0)).collect::<BTreeMap<_, _>>(),
            },
            state,
        }
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record("BTC", 50.0, AlertState::Normal)).unwrap();

        assert_eq!(json["symbol"], "BTC");
        assert_eq!(json["score"], 50.0);
        assert!(json["price"].is_null());
        assert_eq!(json["z"]["funding_rate"], 0.0);
        assert_eq!(json["metrics"]["whale_count"], 0.0);
    }

    #[test]
    fn test_last_run_store_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = LastRunStore::new(Arc::new(JsonFileStore::open(dir.path()).unwrap()));
        assert_eq!(store.load(), None);

        let hot = record("BTC", 80.0, AlertState::Overheat);
        let first = LastRun {
            time: hot.time,
            results: vec![hot.clone(), record("ETH", 50.0, AlertState::Normal)],
            alerts: vec![AlertEvent {
                kind: AlertKind::Overheat,
                record: hot,
            }],
        };
        store.save(&first).unwrap();
        assert_eq!(store.load(), Some(first));

        let second = LastRun {
            time: Utc::now(),
            results: vec![record("ETH", 45.0, AlertState::Normal)],
            alerts: vec![],
        };
        store.save(&second).unwrap();
        assert_eq!(store.load(), Some(second));
    }

    #[test]
    fn test_last_run_store_corrupt_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("last_run.json"), "{\"time\":").unwrap();
        let store = LastRunStore::new(Arc::new(JsonFileStore::open(dir.path()).unwrap()));

        assert_eq!(store.load(), None);
    }
}
