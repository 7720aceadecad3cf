//! Process-wide configuration, read once from environment variables.

use crate::{
    classify::Thresholds,
    error::ConfigError,
    history::{HISTORY_CAPACITY, SCORING_LOOKBACK},
    metric::Asset,
    notify::{EmailConfig, ServerChanConfig, email::DEFAULT_SMTP_HOST},
    score::MetricWeights,
};
use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

/// Default fixed check interval (3 hours).
pub const DEFAULT_INTERVAL_MINUTES: u64 = 180;

pub const DEFAULT_DATA_DIR: &str = ".hist_cache_overheat";

pub const DEFAULT_ASSETS: &str = "BTC:bitcoin,ETH:ethereum";

/// Default timeout for price & notification HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub thresholds: Thresholds,
    pub interval: Duration,
    /// Tracked assets in processing order.
    pub assets: Vec<Asset>,
    pub weights: MetricWeights,
    pub data_dir: PathBuf,
    pub history_capacity: usize,
    pub scoring_lookback: usize,
    pub http_timeout: Duration,
    pub glassnode_api_key: Option<String>,
    pub email: Option<EmailConfig>,
    pub serverchan: Option<ServerChanConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            assets: parse_assets(DEFAULT_ASSETS).unwrap_or_default(),
            weights: MetricWeights::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            history_capacity: HISTORY_CAPACITY,
            scoring_lookback: SCORING_LOOKBACK,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            glassnode_api_key: None,
            email: None,
            serverchan: None,
        }
    }
}

/// Parse `SYMBOL:id` pairs, eg/ "BTC:bitcoin,ETH:ethereum".
pub fn parse_assets(input: &str) -> Result<Vec<Asset>, ConfigError> {
    let assets = input
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((symbol, id)) if !symbol.trim().is_empty() && !id.trim().is_empty() => Ok(
                Asset::new(symbol.trim().to_uppercase(), id.trim().to_lowercase()),
            ),
            _ => Err(ConfigError::MalformedAsset(entry.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if assets.is_empty() {
        return Err(ConfigError::NoAssets);
    }
    Ok(assets)
}

fn parse_var<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|error: T::Err| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: error.to_string(),
            }),
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let thresholds = Thresholds {
            overheat: parse_var(
                "OVERHEAT_THRESHOLD",
                var("OVERHEAT_THRESHOLD"),
                defaults.thresholds.overheat,
            )?,
            oversold: parse_var(
                "OVERSOLD_THRESHOLD",
                var("OVERSOLD_THRESHOLD"),
                defaults.thresholds.oversold,
            )?,
        };

        let minutes = parse_var(
            "CHECK_INTERVAL_MINUTES",
            var("CHECK_INTERVAL_MINUTES"),
            DEFAULT_INTERVAL_MINUTES,
        )?;
        if minutes == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let assets = match var("ASSETS") {
            Some(raw) => parse_assets(&raw)?,
            None => defaults.assets,
        };

        let http_timeout = Duration::from_secs(parse_var(
            "HTTP_TIMEOUT_SECS",
            var("HTTP_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT.as_secs(),
        )?);

        let email = match (
            var("GMAIL_USER"),
            var("GMAIL_APP_PASS"),
            var("ALERT_EMAIL_TO"),
        ) {
            (Some(user), Some(pass), Some(to)) => Some(EmailConfig::new(
                var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                user,
                pass,
                &to,
            )),
            _ => None,
        };

        let config = Self {
            thresholds,
            interval: Duration::from_secs(minutes * 60),
            assets,
            weights: defaults.weights,
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            history_capacity: defaults.history_capacity,
            scoring_lookback: defaults.scoring_lookback,
            http_timeout,
            glassnode_api_key: var("GLASSNODE_API_KEY"),
            email,
            serverchan: var("SERVERCHAN_SENDKEY").map(|send_key| ServerChanConfig { send_key }),
        };

        config.warn_hazards();
        Ok(config)
    }

    /// Log configuration that is accepted but degrades behaviour.
    pub fn warn_hazards(&self) {
        if self.thresholds.is_inverted() {
            warn!(
                overheat = self.thresholds.overheat,
                oversold = self.thresholds.oversold,
                "overheat threshold is not above oversold threshold; overlapping scores classify as Overheat"
            );
        }
        if self.glassnode_api_key.is_none() {
            warn!("GLASSNODE_API_KEY not set, on-chain and ETF metrics fall back to neutral 0");
        }
        if self.email.is_none() {
            warn!("email not fully configured (GMAIL_USER/GMAIL_APP_PASS/ALERT_EMAIL_TO), email alerts disabled");
        }
        if self.serverchan.is_none() {
            warn!("SERVERCHAN_SENDKEY not set, push alerts disabled");
        }
    }
}
