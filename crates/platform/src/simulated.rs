//! In-memory platform for exercising the sync loop without a network.
//!
//! Records every surface invocation and can be scripted to fail specific
//! surfaces, so tests can assert both what was attempted and how failures
//! propagate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use tickerbot_core::{ChannelId, GroupId, Platform, UpdateError};

/// One recorded surface invocation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Presence(String),
    DisplayName(GroupId, String),
    RenameChannel(ChannelId, String),
}

struct Inner {
    ready: watch::Sender<bool>,
    closed: watch::Sender<bool>,
    guilds: Mutex<Vec<GroupId>>,
    calls: Mutex<Vec<SurfaceCall>>,
    /// Instants of presence calls, used as per-cycle timestamps.
    presence_times: Mutex<Vec<tokio::time::Instant>>,
    presence_error: Mutex<Option<UpdateError>>,
    display_name_errors: Mutex<HashMap<GroupId, UpdateError>>,
    rename_error: Mutex<Option<UpdateError>>,
    group_ids_error: Mutex<Option<UpdateError>>,
    /// Close the connection once this many presence calls have landed.
    close_after_presence: Mutex<Option<usize>>,
}

/// A simulated platform connection.
///
/// Clones share the same underlying state, mirroring how handles to the
/// live connection behave.
#[derive(Clone)]
pub struct SimulatedPlatform {
    inner: Arc<Inner>,
}

impl SimulatedPlatform {
    /// A connection that is ready from the start.
    pub fn new(guilds: &[GroupId]) -> Self {
        let platform = Self::unready(guilds);
        platform.mark_ready();
        platform
    }

    /// A connection that stays unready until [`Self::mark_ready`].
    pub fn unready(guilds: &[GroupId]) -> Self {
        let (ready, _) = watch::channel(false);
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                ready,
                closed,
                guilds: Mutex::new(guilds.to_vec()),
                calls: Mutex::new(Vec::new()),
                presence_times: Mutex::new(Vec::new()),
                presence_error: Mutex::new(None),
                display_name_errors: Mutex::new(HashMap::new()),
                rename_error: Mutex::new(None),
                group_ids_error: Mutex::new(None),
                close_after_presence: Mutex::new(None),
            }),
        }
    }

    pub fn mark_ready(&self) {
        self.inner.ready.send_replace(true);
    }

    pub fn close(&self) {
        self.inner.closed.send_replace(true);
    }

    /// Replace the group membership seen by subsequent cycles.
    pub fn set_guilds(&self, guilds: &[GroupId]) {
        *self.inner.guilds.lock().unwrap() = guilds.to_vec();
    }

    pub fn fail_presence(&self, err: UpdateError) {
        *self.inner.presence_error.lock().unwrap() = Some(err);
    }

    pub fn fail_display_name(&self, group: GroupId, err: UpdateError) {
        self.inner
            .display_name_errors
            .lock()
            .unwrap()
            .insert(group, err);
    }

    pub fn fail_rename(&self, err: UpdateError) {
        *self.inner.rename_error.lock().unwrap() = Some(err);
    }

    pub fn fail_group_ids(&self, err: UpdateError) {
        *self.inner.group_ids_error.lock().unwrap() = Some(err);
    }

    /// Close the connection after `n` more presence calls.
    pub fn close_after_presence(&self, n: usize) {
        *self.inner.close_after_presence.lock().unwrap() = Some(n);
    }

    /// Every surface invocation recorded so far.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Timestamps of presence calls (one per attempted cycle).
    pub fn presence_times(&self) -> Vec<tokio::time::Instant> {
        self.inner.presence_times.lock().unwrap().clone()
    }

    fn record(&self, call: SurfaceCall) {
        self.inner.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Platform for SimulatedPlatform {
    async fn wait_until_ready(&self) -> bool {
        let mut ready = self.inner.ready.subscribe();
        let mut closed = self.inner.closed.subscribe();
        tokio::select! {
            result = ready.wait_for(|ready| *ready) => result.is_ok(),
            _ = closed.wait_for(|closed| *closed) => false,
        }
    }

    fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    async fn closed(&self) {
        let mut closed = self.inner.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    async fn group_ids(&self) -> Result<Vec<GroupId>, UpdateError> {
        if let Some(err) = self.inner.group_ids_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.inner.guilds.lock().unwrap().clone())
    }

    async fn set_presence(&self, label: &str) -> Result<(), UpdateError> {
        self.record(SurfaceCall::Presence(label.to_string()));
        self.inner
            .presence_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        let should_close = {
            let mut remaining = self.inner.close_after_presence.lock().unwrap();
            match remaining.as_mut() {
                Some(n) => {
                    *n = n.saturating_sub(1);
                    *n == 0
                }
                None => false,
            }
        };
        if should_close {
            self.close();
        }

        match self.inner.presence_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn set_display_name(&self, group: GroupId, name: &str) -> Result<(), UpdateError> {
        self.record(SurfaceCall::DisplayName(group, name.to_string()));
        match self.inner.display_name_errors.lock().unwrap().get(&group) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn rename_channel(&self, channel: ChannelId, name: &str) -> Result<(), UpdateError> {
        self.record(SurfaceCall::RenameChannel(channel, name.to_string()));
        match self.inner.rename_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
