//! Data collaborators consumed by the check cycle.
//!
//! Neither trait has an error channel: failures surface as a missing price or
//! a degraded [`MetricReading`].

use crate::metric::{Asset, Metric, MetricReading};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// CoinGecko market prices.
pub mod coingecko;

/// Glassnode on-chain & institutional metrics.
pub mod glassnode;

pub use coingecko::CoinGecko;
pub use glassnode::Glassnode;

/// Spot price and 24h change for one asset. Fields are `None` when unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct PriceQuote {
    pub price: Option<f64>,
    pub change_24h_pct: Option<f64>,
}

impl PriceQuote {
    pub fn unknown() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, asset: &Asset) -> PriceQuote;
}

#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch_metric(&self, metric: Metric, asset: &Asset) -> MetricReading;
}
