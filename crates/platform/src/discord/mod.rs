//! Discord adapter.
//!
//! Presence and connection lifecycle ride the gateway websocket; nicknames
//! and channel renames go over REST. One [`DiscordConnection`] wraps both.

mod gateway;
mod protocol;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use tickerbot_core::{ChannelId, GroupId, Platform, UpdateError};

use gateway::{Command, Shared};

/// Errors raised while establishing the connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Gateway handshake failed: {0}")]
    Handshake(String),
    #[error("Gateway setup failed: {0}")]
    Setup(String),
    #[error("REST client setup failed: {0}")]
    Rest(String),
}

/// A live Discord connection implementing [`Platform`].
///
/// Cloning yields another handle to the same underlying session.
#[derive(Clone)]
pub struct DiscordConnection {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    rest: rest::RestClient,
}

impl DiscordConnection {
    /// Open the gateway session and prepare the REST client.
    ///
    /// Readiness (and therefore the authentication outcome) is observed via
    /// [`Platform::wait_until_ready`]: a rejected token shows up as the
    /// connection closing before it ever becomes ready.
    pub async fn connect(token: &str) -> Result<Self, ConnectError> {
        let rest = rest::RestClient::new(token)?;
        let shared = Arc::new(Shared::new());
        let commands = gateway::connect(token, Arc::clone(&shared)).await?;
        info!("discord gateway connected, awaiting ready");
        Ok(Self {
            shared,
            commands,
            rest,
        })
    }
}

#[async_trait]
impl Platform for DiscordConnection {
    async fn wait_until_ready(&self) -> bool {
        let mut ready = self.shared.ready.subscribe();
        let mut closed = self.shared.closed.subscribe();
        tokio::select! {
            result = ready.wait_for(|ready| *ready) => result.is_ok(),
            _ = closed.wait_for(|closed| *closed) => false,
        }
    }

    fn is_closed(&self) -> bool {
        *self.shared.closed.borrow()
    }

    async fn closed(&self) {
        let mut closed = self.shared.closed.subscribe();
        // An error means the session task is gone, which is also closure.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    async fn group_ids(&self) -> Result<Vec<GroupId>, UpdateError> {
        if self.is_closed() {
            return Err(UpdateError::Transient("connection closed".to_string()));
        }
        Ok(self.shared.guilds.read().await.iter().copied().collect())
    }

    async fn set_presence(&self, label: &str) -> Result<(), UpdateError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Presence(label.to_string(), ack))
            .await
            .map_err(|_| UpdateError::Transient("gateway session ended".to_string()))?;
        done.await
            .map_err(|_| UpdateError::Transient("gateway session ended".to_string()))?
    }

    async fn set_display_name(&self, group: GroupId, name: &str) -> Result<(), UpdateError> {
        self.rest.set_nickname(group, name).await
    }

    async fn rename_channel(&self, channel: ChannelId, name: &str) -> Result<(), UpdateError> {
        self.rest.rename_channel(channel, name).await
    }
}
