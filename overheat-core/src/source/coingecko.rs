use super::{PriceQuote, PriceSource};
use crate::{error::FetchError, metric::Asset};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko `/coins/markets` response row.
#[derive(Debug, Deserialize)]
struct CoinGeckoMarket {
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
}

impl From<&CoinGeckoMarket> for PriceQuote {
    fn from(market: &CoinGeckoMarket) -> Self {
        Self {
            price: market.current_price,
            change_24h_pct: market.price_change_percentage_24h,
        }
    }
}

/// [`PriceSource`] backed by the public CoinGecko REST API.
#[derive(Debug, Clone)]
pub struct CoinGecko {
    client: Client,
    base_url: String,
}

impl CoinGecko {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn request(&self, asset: &Asset) -> Result<PriceQuote, FetchError> {
        let response = self
            .client
            .get(format!("{}/coins/markets", self.base_url))
            .query(&[
                ("vs_currency", "usd"),
                ("ids", asset.id.as_str()),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let markets: Vec<CoinGeckoMarket> = response.json().await?;
        markets.first().map(PriceQuote::from).ok_or(FetchError::Empty)
    }
}

#[async_trait]
impl PriceSource for CoinGecko {
    async fn fetch_price(&self, asset: &Asset) -> PriceQuote {
        match self.request(asset).await {
            Ok(quote) => {
                debug!(asset = %asset.symbol, price = ?quote.price, "price fetched");
                quote
            }
            Err(error) => {
                warn!(
                    asset = %asset.symbol,
                    timeout = error.is_timeout(),
                    %error,
                    "price fetch failed, continuing with unknown price"
                );
                PriceQuote::unknown()
            }
        }
    }
}
