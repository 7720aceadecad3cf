use super::MetricSource;
use crate::{
    error::FetchError,
    metric::{Asset, DegradedReason, Metric, MetricReading},
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://api.glassnode.com/v1";

/// Timeout applied to every Glassnode call.
pub const DEFAULT_METRIC_TIMEOUT: Duration = Duration::from_secs(8);

/// Glassnode endpoint path for `metric`, `None` for metrics without a provider.
pub fn endpoint(metric: Metric) -> Option<&'static str> {
    match metric {
        Metric::EtfNetflow => Some("institutions/UsSpotEtfFlowsNet"),
        Metric::ExchangeNetflow => Some("transactions/TransfersVolumeToExchangesSum"),
        Metric::FundingRate => Some("derivatives/FuturesFundingRatePerpetual"),
        Metric::OiChangePct | Metric::WhaleCount | Metric::ReserveChangePct => None,
    }
}

/// Extract the latest value from a Glassnode response.
///
/// Series responses are `[{"t": .., "v": ..}, ..]` and yield the last point's
/// `v`; a bare number is returned as is.
fn latest_value(body: &Value) -> Result<f64, FetchError> {
    let value = match body {
        Value::Array(points) => points
            .last()
            .ok_or(FetchError::Empty)?
            .get("v")
            .ok_or(FetchError::MissingField("v"))?,
        other => other,
    };

    let value = match value {
        Value::Number(number) => number.as_f64().ok_or(FetchError::MissingField("v"))?,
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| FetchError::MissingField("v"))?,
        _ => return Err(FetchError::MissingField("v")),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(FetchError::NonFinite(value))
    }
}

/// [`MetricSource`] backed by the Glassnode REST API.
///
/// Without an API key every reading is [`DegradedReason::Unconfigured`].
#[derive(Debug, Clone)]
pub struct Glassnode {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Glassnode {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base_url(BASE_URL, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request(&self, path: &str, api_key: &str, asset: &Asset) -> Result<f64, FetchError> {
        let response = self
            .client
            .get(format!("{}/metrics/{}", self.base_url, path))
            .query(&[("a", asset.symbol.as_str()), ("api_key", api_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        latest_value(&body)
    }
}

#[async_trait]
impl MetricSource for Glassnode {
    async fn fetch_metric(&self, metric: Metric, asset: &Asset) -> MetricReading {
        let Some(path) = endpoint(metric) else {
            return MetricReading::Degraded(DegradedReason::Placeholder);
        };
        let Some(api_key) = self.api_key.as_deref() else {
            return MetricReading::Degraded(DegradedReason::Unconfigured);
        };

        match self.request(path, api_key, asset).await {
            Ok(value) => {
                debug!(asset = %asset.symbol, %metric, value, "metric fetched");
                MetricReading::Measured(value)
            }
            Err(error) => {
                warn!(
                    asset = %asset.symbol,
                    %metric,
                    timeout = error.is_timeout(),
                    %error,
                    "metric fetch failed, using neutral value"
                );
                MetricReading::Degraded(DegradedReason::Failed(error.to_string()))
            }
        }
    }
}
