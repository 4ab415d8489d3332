use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Quote Source Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while fetching a quote.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Quote provider returned HTTP {0}")]
    Status(u16),
    #[error("Malformed quote response: {0}")]
    Parse(String),
    #[error("No price for {asset_id}/{vs_currency} in response")]
    MissingField {
        asset_id: String,
        vs_currency: String,
    },
}

/// Fetches the current price of an asset from a remote provider.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the latest price for `asset_id` denominated in `vs_currency`.
    ///
    /// One live call per invocation; no caching, no retry.
    async fn latest(&self, asset_id: &str, vs_currency: &str) -> Result<Quote, FetchError>;
}

// ---------------------------------------------------------------------------
// Platform Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while updating a platform surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpdateError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Transient failure: {0}")]
    Transient(String),
    #[error("Unknown failure: {0}")]
    Unknown(String),
}

/// A live connection to the collaboration platform.
///
/// Whoever builds the connection owns its lifecycle; consumers only observe
/// readiness and closure and push updates through the methods below.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Wait until the connection is authenticated and usable.
    ///
    /// Returns false if the connection closed before it ever became ready
    /// (e.g. the platform rejected the credentials).
    async fn wait_until_ready(&self) -> bool;

    /// Check whether the connection has closed.
    fn is_closed(&self) -> bool;

    /// Resolve once the connection closes.
    async fn closed(&self);

    /// Groups the bot currently belongs to, from live connection state.
    async fn group_ids(&self) -> Result<Vec<GroupId>, UpdateError>;

    /// Set the connection-wide presence label.
    async fn set_presence(&self, label: &str) -> Result<(), UpdateError>;

    /// Set the bot's own display name in one group.
    async fn set_display_name(&self, group: GroupId, name: &str) -> Result<(), UpdateError>;

    /// Rename a channel.
    async fn rename_channel(&self, channel: ChannelId, name: &str) -> Result<(), UpdateError>;
}
