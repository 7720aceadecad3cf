//! Z-score normalisation and weighted composite scoring.
//!
//! Each metric is scored against its own rolling history, the per-metric
//! z-scores are combined with fixed signed weights, and the weighted sum is
//! clipped to `[-3, 3]` and rescaled onto `0..=100`.

use crate::metric::{Metric, MetricSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lower clip bound of the raw weighted z-sum.
pub const RAW_MIN: f64 = -3.0;

/// Upper clip bound of the raw weighted z-sum.
pub const RAW_MAX: f64 = 3.0;

/// Population mean and standard deviation of `values`.
fn mean_pstdev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Z-score of `value` against `history`.
///
/// Returns 0 when the history has fewer than two points or zero spread.
pub fn zscore(value: f64, history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }

    let (mean, std) = mean_pstdev(history);
    if std == 0.0 {
        return 0.0;
    }

    (value - mean) / std
}

/// Clip `raw` to `[RAW_MIN, RAW_MAX]` and rescale linearly onto `0..=100`.
///
/// 0 maps to 50.
pub fn normalize(raw: f64) -> f64 {
    let clipped = raw.clamp(RAW_MIN, RAW_MAX);
    (clipped - RAW_MIN) / (RAW_MAX - RAW_MIN) * 100.0
}

/// Signed per-metric weights applied to z-scores.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricWeights(BTreeMap<Metric, f64>);

impl MetricWeights {
    pub fn new(weights: impl IntoIterator<Item = (Metric, f64)>) -> Self {
        Self(weights.into_iter().collect())
    }

    /// Weight for `metric`, 0 if unweighted.
    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(0.0)
    }
}

impl Default for MetricWeights {
    /// Rising exchange reserves read as cooling, hence the negative weight.
    fn default() -> Self {
        Self::new([
            (Metric::EtfNetflow, 0.30),
            (Metric::ExchangeNetflow, 0.15),
            (Metric::OiChangePct, 0.15),
            (Metric::FundingRate, 0.10),
            (Metric::WhaleCount, 0.10),
            (Metric::ReserveChangePct, -0.20),
        ])
    }
}

/// Composite score for one asset in one cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoreResult {
    /// Normalised composite score in `0..=100`.
    pub score: f64,
    /// Signed, unbounded z-score per metric.
    pub z: BTreeMap<Metric, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreEngine {
    weights: MetricWeights,
}

impl ScoreEngine {
    pub fn new(weights: MetricWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &MetricWeights {
        &self.weights
    }

    /// Score `snapshot` against `histories`.
    ///
    /// Each history must be the baseline as it stood before the snapshot value
    /// was appended. A metric without a history entry scores z = 0.
    pub fn score(
        &self,
        snapshot: &MetricSnapshot,
        histories: &BTreeMap<Metric, Vec<f64>>,
    ) -> ScoreResult {
        let z: BTreeMap<Metric, f64> = snapshot
            .iter()
            .map(|(metric, value)| {
                let history = histories.get(metric).map(Vec::as_slice).unwrap_or(&[]);
                (*metric, zscore(*value, history))
            })
            .collect();

        let raw = z
            .iter()
            .map(|(metric, z)| z * self.weights.get(*metric))
            .sum::<f64>();

        ScoreResult {
            score: normalize(raw),
            z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_zscore_insufficient_history() {
        assert_eq!(zscore(1_000_000.0, &[]), 0.0);
        assert_eq!(zscore(-42.0, &[5.0]), 0.0);
    }

    #[test]
    fn test_zscore_constant_history() {
        let history = vec![3.0; 50];
        for value in [3.0, -1e12, 1e12, 0.0] {
            let z = zscore(value, &history);
            assert_eq!(z, 0.0);
            assert!(z.is_finite());
        }
    }

    #[test]
    fn test_zscore_population_stddev() {
        // mean 2, population std 1
        assert!(approx_eq(zscore(5.0, &[1.0, 3.0]), 3.0));
        // mean 5, population std 2
        let history = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx_eq(zscore(9.0, &history), 2.0));
        assert!(approx_eq(zscore(1.0, &history), -2.0));
    }

    #[test]
    fn test_normalize() {
        struct TestCase {
            input: f64,
            expected: f64,
        }

        let tests = vec![
            TestCase { input: 0.0, expected: 50.0 },    // TC0: neutral
            TestCase { input: -3.0, expected: 0.0 },    // TC1: lower bound
            TestCase { input: 3.0, expected: 100.0 },   // TC2: upper bound
            TestCase { input: -10.0, expected: 0.0 },   // TC3: clipped low
            TestCase { input: 10.0, expected: 100.0 },  // TC4: clipped high
            TestCase { input: 1.5, expected: 75.0 },    // TC5: linear interior
            TestCase { input: -0.6, expected: 40.0 },   // TC6: linear interior
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = normalize(test.input);
            assert!(
                approx_eq(actual, test.expected),
                "TC{} failed: {} != {}",
                index,
                actual,
                test.expected
            );
        }
    }

    #[test]
    fn test_normalize_monotonic() {
        let mut prev = normalize(-20.0);
        let mut raw = -20.0;
        while raw <= 20.0 {
            let current = normalize(raw);
            assert!(current >= prev);
            prev = current;
            raw += 0.05;
        }
    }

    #[test]
    fn test_score_cold_start_is_neutral() {
        let engine = ScoreEngine::default();
        let snapshot: MetricSnapshot = Metric::ALL.iter().map(|m| (*m, 0.0)).collect();

        let result = engine.score(&snapshot, &BTreeMap::new());

        assert_eq!(result.score, 50.0);
        assert_eq!(result.z.len(), 6);
        assert!(result.z.values().all(|z| *z == 0.0));
    }

    #[test]
    fn test_score_applies_signed_weights() {
        let engine = ScoreEngine::default();
        let history = vec![1.0, 3.0];

        // etf_netflow z = +3 at weight 0.30 -> raw 0.9 -> 65
        let snapshot = MetricSnapshot::from([(Metric::EtfNetflow, 5.0)]);
        let histories = BTreeMap::from([(Metric::EtfNetflow, history.clone())]);
        let result = engine.score(&snapshot, &histories);
        assert!(approx_eq(result.z[&Metric::EtfNetflow], 3.0));
        assert!(approx_eq(result.score, 65.0));

        // reserve_change_pct z = +3 at weight -0.20 -> raw -0.6 -> 40
        let snapshot = MetricSnapshot::from([(Metric::ReserveChangePct, 5.0)]);
        let histories = BTreeMap::from([(Metric::ReserveChangePct, history)]);
        let result = engine.score(&snapshot, &histories);
        assert!(approx_eq(result.z[&Metric::ReserveChangePct], 3.0));
        assert!(approx_eq(result.score, 40.0));
    }

    #[test]
    fn test_score_clips_outliers() {
        let engine = ScoreEngine::default();
        let snapshot = MetricSnapshot::from([(Metric::EtfNetflow, 1e9)]);
        let histories = BTreeMap::from([(Metric::EtfNetflow, vec![0.0, 1.0, 2.0])]);

        let result = engine.score(&snapshot, &histories);
        assert_eq!(result.score, 100.0);
        assert!(result.z[&Metric::EtfNetflow] > 3.0);
    }

    #[test]
    fn test_default_weights() {
        let weights = MetricWeights::default();
        assert_eq!(weights.get(Metric::EtfNetflow), 0.30);
        assert_eq!(weights.get(Metric::ReserveChangePct), -0.20);
        let total: f64 = Metric::ALL.iter().map(|m| weights.get(*m).abs()).sum();
        assert!(approx_eq(total, 1.0));
    }
}
