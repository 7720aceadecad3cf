//! One complete fetch → score → classify → notify → persist pass over every
//! tracked asset.

use crate::{
    classify::Thresholds,
    config::Config,
    error::CycleError,
    history::{HistoryKey, HistoryStore},
    metric::{Asset, DegradedReason, Metric, MetricReading, MetricSnapshot},
    notify::{Delivery, NotificationDispatcher},
    record::{AlertEvent, CheckRecord, LastRun, LastRunStore},
    score::ScoreEngine,
    source::{MetricSource, PriceSource},
};
use async_trait::async_trait;
use chrono::Utc;
use derive_more::Display;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc, time::Instant};
use tracing::{debug, error, info, warn};

/// Phase of an in-flight cycle.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Scoring,
    Classifying,
    Notifying,
    Persisting,
}

/// Everything a cycle produced, for display after a manual trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    #[serde(flatten)]
    pub last_run: LastRun,
    pub deliveries: Vec<Delivery>,
    /// Non-fatal persistence failures, eg/ a history append that was lost.
    pub warnings: Vec<String>,
}

/// Something the scheduler can run once per tick.
#[async_trait]
pub trait RunCycle: Send + Sync {
    async fn run(&self) -> Result<CycleReport, CycleError>;
}

pub struct CheckCycle {
    assets: Vec<Asset>,
    thresholds: Thresholds,
    scoring_lookback: usize,
    engine: ScoreEngine,
    prices: Arc<dyn PriceSource>,
    metrics: Arc<dyn MetricSource>,
    history: Arc<dyn HistoryStore>,
    last_run: LastRunStore,
    dispatcher: NotificationDispatcher,
    state: Mutex<CycleState>,
}

impl std::fmt::Debug for CheckCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckCycle")
            .field("assets", &self.assets)
            .field("thresholds", &self.thresholds)
            .field("scoring_lookback", &self.scoring_lookback)
            .field("dispatcher", &self.dispatcher)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Metrics that fell back to neutral even though a provider exists for them.
fn unavailable_metrics(readings: &[(Metric, MetricReading)]) -> Vec<Metric> {
    readings
        .iter()
        .filter(|(_, reading)| {
            reading.is_degraded()
                && !matches!(
                    reading,
                    MetricReading::Degraded(DegradedReason::Placeholder)
                )
        })
        .map(|(metric, _)| *metric)
        .collect()
}

impl CheckCycle {
    pub fn new(
        config: &Config,
        prices: Arc<dyn PriceSource>,
        metrics: Arc<dyn MetricSource>,
        history: Arc<dyn HistoryStore>,
        last_run: LastRunStore,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            assets: config.assets.clone(),
            thresholds: config.thresholds,
            scoring_lookback: config.scoring_lookback,
            engine: ScoreEngine::new(config.weights.clone()),
            prices,
            metrics,
            history,
            last_run,
            dispatcher,
            state: Mutex::new(CycleState::Idle),
        }
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock()
    }

    fn enter(&self, state: CycleState) {
        debug!(%state, "check cycle state");
        *self.state.lock() = state;
    }

    async fn fetch_metrics(&self, asset: &Asset) -> Vec<(Metric, MetricReading)> {
        join_all(Metric::ALL.into_iter().map(|metric| async move {
            (metric, self.metrics.fetch_metric(metric, asset).await)
        }))
        .await
    }

    /// Score one asset, appending its fresh values to history.
    async fn check_asset(
        &self,
        asset: &Asset,
        time: chrono::DateTime<Utc>,
        warnings: &mut Vec<String>,
    ) -> CheckRecord {
        self.enter(CycleState::Fetching);
        let (quote, readings) = tokio::join!(
            self.prices.fetch_price(asset),
            self.fetch_metrics(asset)
        );

        let unavailable = unavailable_metrics(&readings);
        if !unavailable.is_empty() {
            warn!(
                asset = %asset.symbol,
                metrics = ?unavailable,
                "metrics unavailable, defaulted to neutral 0"
            );
        }
        let snapshot: MetricSnapshot = readings
            .iter()
            .map(|(metric, reading)| (*metric, reading.value()))
            .collect();

        self.enter(CycleState::Scoring);
        let mut histories = BTreeMap::new();
        for (metric, value) in &snapshot {
            let key = HistoryKey::new(asset.id.clone(), *metric);
            histories.insert(*metric, self.history.load(&key, self.scoring_lookback));

            if let Err(error) = self.history.append(&key, *value) {
                error!(%key, %error, "failed to append metric history");
                warnings.push(format!("history append {key}: {error}"));
            }
        }
        let score = self.engine.score(&snapshot, &histories);

        self.enter(CycleState::Classifying);
        let state = self.thresholds.classify(score.score);
        info!(
            asset = %asset.symbol,
            price = ?quote.price,
            score = score.score,
            %state,
            "asset checked"
        );

        CheckRecord {
            time,
            symbol: asset.symbol.clone(),
            price: quote.price,
            price_change_24h_pct: quote.change_24h_pct,
            metrics: snapshot,
            score,
            state,
        }
    }

    /// Run one complete cycle.
    ///
    /// Only the final snapshot write can fail the cycle; alerts have already
    /// been dispatched by then.
    pub async fn run(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let time = Utc::now();
        let mut warnings = Vec::new();
        let mut results = Vec::with_capacity(self.assets.len());
        let mut alerts = Vec::new();

        for asset in &self.assets {
            let record = self.check_asset(asset, time, &mut warnings).await;
            if let Some(kind) = record.state.alert() {
                alerts.push(AlertEvent {
                    kind,
                    record: record.clone(),
                });
            }
            results.push(record);
        }

        self.enter(CycleState::Notifying);
        let deliveries = self.dispatcher.dispatch(&alerts).await;

        self.enter(CycleState::Persisting);
        let last_run = LastRun {
            time,
            results,
            alerts,
        };
        let saved = self.last_run.save(&last_run);
        self.enter(CycleState::Idle);

        if let Err(error) = saved {
            error!(%error, "failed to persist last-run snapshot");
            return Err(error.into());
        }

        info!(
            assets = last_run.results.len(),
            alerts = last_run.alerts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "check cycle complete"
        );

        Ok(CycleReport {
            last_run,
            deliveries,
            warnings,
        })
    }
}

#[async_trait]
impl RunCycle for CheckCycle {
    async fn run(&self) -> Result<CycleReport, CycleError> {
        CheckCycle::run(self).await
    }
}
