//! Tracked assets, the fixed metric set, and per-cycle metric snapshots.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// A monitored asset.
///
/// `symbol` is the display ticker (eg/ "BTC"); `id` is the price provider's
/// identifier (eg/ "bitcoin") and names the history keys.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Asset {
    pub symbol: SmolStr,
    pub id: SmolStr,
    /// Minimum transfer size counted by the whale-count metric.
    pub whale_threshold: f64,
}

impl Asset {
    pub fn new(symbol: impl Into<SmolStr>, id: impl Into<SmolStr>) -> Self {
        let symbol = symbol.into();
        let whale_threshold = if symbol.eq_ignore_ascii_case("BTC") {
            100.0
        } else {
            1000.0
        };
        Self {
            symbol,
            id: id.into(),
            whale_threshold,
        }
    }
}

/// The six metrics sampled for every asset in every cycle.
///
/// Declaration order is the canonical display order.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[display("etf_netflow")]
    EtfNetflow,
    #[display("exchange_netflow")]
    ExchangeNetflow,
    #[display("oi_change_pct")]
    OiChangePct,
    #[display("funding_rate")]
    FundingRate,
    #[display("whale_count")]
    WhaleCount,
    #[display("reserve_change_pct")]
    ReserveChangePct,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::EtfNetflow,
        Metric::ExchangeNetflow,
        Metric::OiChangePct,
        Metric::FundingRate,
        Metric::WhaleCount,
        Metric::ReserveChangePct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::EtfNetflow => "etf_netflow",
            Metric::ExchangeNetflow => "exchange_netflow",
            Metric::OiChangePct => "oi_change_pct",
            Metric::FundingRate => "funding_rate",
            Metric::WhaleCount => "whale_count",
            Metric::ReserveChangePct => "reserve_change_pct",
        }
    }
}

/// Why a metric reading fell back to the neutral value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// The provider for this metric has no credentials configured.
    Unconfigured,
    /// The metric has no real provider yet and always reports neutral.
    Placeholder,
    /// The provider call failed or timed out.
    Failed(String),
}

/// Outcome of a single metric fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricReading {
    Measured(f64),
    Degraded(DegradedReason),
}

impl MetricReading {
    /// Neutral value substituted for every degraded reading.
    pub const NEUTRAL: f64 = 0.0;

    /// Collapse the reading into the raw value used for scoring and history.
    ///
    /// This is the only place a degraded reading becomes a number. A measured
    /// NaN or infinity is not representable in stored history and counts as
    /// degraded.
    pub fn value(&self) -> f64 {
        match self {
            MetricReading::Measured(value) if value.is_finite() => *value,
            _ => Self::NEUTRAL,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, MetricReading::Measured(value) if value.is_finite())
    }
}

/// Freshly fetched raw metric values for one asset in one cycle.
pub type MetricSnapshot = BTreeMap<Metric, f64>;
