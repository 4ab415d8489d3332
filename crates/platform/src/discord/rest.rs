//! REST calls for the surfaces the gateway cannot reach: per-guild
//! nicknames and channel renames.

use std::time::Duration;

use reqwest::{header, StatusCode};
use serde_json::json;
use tracing::debug;

use tickerbot_core::{ChannelId, GroupId, UpdateError};

use crate::discord::ConnectError;

/// Discord REST API root.
const API_BASE_URL: &str = "https://discord.com/api/v10";

/// HTTP timeout for a single surface update.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub(crate) struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub(crate) fn new(token: &str) -> Result<Self, ConnectError> {
        let mut auth = header::HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|e| ConnectError::Rest(format!("token is not a valid header value: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("DiscordBot (tickerbot, 0.1)")
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectError::Rest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Set the bot's own nickname in one guild.
    pub(crate) async fn set_nickname(&self, guild: GroupId, nick: &str) -> Result<(), UpdateError> {
        let url = format!("{}/guilds/{}/members/@me", self.base_url, guild);
        self.patch(&url, json!({ "nick": nick })).await
    }

    /// Rename a channel.
    pub(crate) async fn rename_channel(
        &self,
        channel: ChannelId,
        name: &str,
    ) -> Result<(), UpdateError> {
        let url = format!("{}/channels/{}", self.base_url, channel);
        self.patch(&url, json!({ "name": name })).await
    }

    async fn patch(&self, url: &str, body: serde_json::Value) -> Result<(), UpdateError> {
        debug!(%url, "platform PATCH");
        let response = self
            .client
            .patch(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpdateError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(classify(status, &detail))
    }
}

/// Map a REST failure onto the update error taxonomy.
fn classify(status: StatusCode, body: &str) -> UpdateError {
    let detail = format!("HTTP {}: {}", status.as_u16(), summarize(body));
    match status.as_u16() {
        401 | 403 => UpdateError::PermissionDenied(detail),
        404 => UpdateError::NotFound(detail),
        408 | 429 | 500..=599 => UpdateError::Transient(detail),
        _ => UpdateError::Unknown(detail),
    }
}

/// The `message` field of a Discord error body, or the truncated raw body.
fn summarize(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    body.trim().chars().take(120).collect()
}
