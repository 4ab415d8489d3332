use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use tickerbot_core::{FetchError, Quote, QuoteSource};

/// Public CoinGecko API root.
const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// HTTP timeout for a single quote fetch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response shape of `/simple/price`: asset id -> currency -> price.
#[derive(Debug, Deserialize)]
struct SimplePriceResponse(HashMap<String, HashMap<String, f64>>);

// ---------------------------------------------------------------------------
// CoinGecko Source
// ---------------------------------------------------------------------------

/// CoinGecko implementation of [`QuoteSource`].
///
/// Each call performs one live GET; retry cadence belongs to the caller.
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the source at a different API root (proxies, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn price_url(&self, asset_id: &str, vs_currency: &str) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, asset_id, vs_currency
        )
    }
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoSource {
    async fn latest(&self, asset_id: &str, vs_currency: &str) -> Result<Quote, FetchError> {
        let url = self.price_url(asset_id, vs_currency);
        debug!(%url, "fetching quote");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let price = extract_price(&body, asset_id, vs_currency)?;
        Ok(Quote::new(asset_id, vs_currency, price))
    }
}

/// Pull the `[asset_id][vs_currency]` price out of a simple-price body.
fn extract_price(body: &str, asset_id: &str, vs_currency: &str) -> Result<Decimal, FetchError> {
    let parsed: SimplePriceResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let raw = parsed
        .0
        .get(asset_id)
        .and_then(|currencies| currencies.get(vs_currency))
        .copied()
        .ok_or_else(|| FetchError::MissingField {
            asset_id: asset_id.to_string(),
            vs_currency: vs_currency.to_string(),
        })?;

    // JSON numbers are parsed as f64; values a Decimal cannot hold are a
    // provider anomaly and surface as a parse failure.
    Decimal::try_from(raw)
        .map_err(|e| FetchError::Parse(format!("price {} not representable: {}", raw, e)))
}
