use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Numeric id of a group (server) the bot is a member of.
pub type GroupId = u64;

/// Numeric id of a renameable channel.
pub type ChannelId = u64;

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// A single fetched price for the tracked asset.
///
/// Quotes carry no identity: each cycle fetches a fresh one and the previous
/// one is simply superseded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Asset id on the quote provider (e.g. "wemix-token").
    pub asset_id: String,
    /// Currency the price is denominated in (e.g. "usd").
    pub vs_currency: String,
    pub price: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(asset_id: &str, vs_currency: &str, price: Decimal) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            vs_currency: vs_currency.to_string(),
            price,
            fetched_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatted price
// ---------------------------------------------------------------------------

/// The two renderings of a quote, one per naming regime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedPrice {
    /// Currency-formatted, for presence labels and display names
    /// (e.g. "$1,234.5000").
    pub human: String,
    /// Safe for resource names: digits and hyphens only (e.g. "1234-50").
    pub channel: String,
}
