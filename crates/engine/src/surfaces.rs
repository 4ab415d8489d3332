use tickerbot_core::{ChannelId, FormattedPrice, GroupId, Platform, UpdateError};
use tracing::warn;

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Outcome of one surface update attempt.
#[derive(Debug, Clone)]
pub enum SurfaceOutcome {
    /// The platform accepted the new value.
    Updated,
    /// The surface is not configured; nothing was attempted.
    Skipped,
    /// The attempt failed; the rest of the cycle continued regardless.
    Failed(UpdateError),
}

impl SurfaceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SurfaceOutcome::Failed(_))
    }
}

/// Everything that happened to the surfaces during one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub presence: SurfaceOutcome,
    /// Per-group display name outcomes, in enumeration order.
    pub display_names: Vec<(GroupId, SurfaceOutcome)>,
    pub channel: SurfaceOutcome,
}

impl CycleReport {
    /// Count of failed attempts across all surfaces.
    pub fn failures(&self) -> usize {
        let display_failures = self
            .display_names
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .count();
        display_failures
            + usize::from(self.presence.is_failure())
            + usize::from(self.channel.is_failure())
    }
}

// ---------------------------------------------------------------------------
// Surface updater
// ---------------------------------------------------------------------------

/// Pushes a formatted price onto every configured surface.
///
/// Surfaces are independent: a failure on one is logged, recorded in the
/// report, and never short-circuits the others.
#[derive(Debug, Clone)]
pub struct SurfaceUpdater {
    /// Prepended to the presence label ("WEMIX at" yields "WEMIX at $1.2345").
    pub presence_prefix: String,
    /// Prepended to per-group display names.
    pub nickname_prefix: String,
    /// Channel name prefix, joined to the channel-safe price with '-'.
    pub channel_prefix: String,
    /// Channel to rename; None disables that surface.
    pub channel_id: Option<ChannelId>,
}

impl SurfaceUpdater {
    /// Update all surfaces in a fixed order: presence, display names,
    /// channel rename.
    pub async fn apply<P: Platform>(&self, platform: &P, price: &FormattedPrice) -> CycleReport {
        let presence = self.update_presence(platform, price).await;
        let display_names = self.update_display_names(platform, price).await;
        let channel = self.update_channel(platform, price).await;
        CycleReport {
            presence,
            display_names,
            channel,
        }
    }

    async fn update_presence<P: Platform>(
        &self,
        platform: &P,
        price: &FormattedPrice,
    ) -> SurfaceOutcome {
        let label = format!("{} {}", self.presence_prefix, price.human);
        match platform.set_presence(&label).await {
            Ok(()) => SurfaceOutcome::Updated,
            Err(e) => {
                warn!(surface = "presence", error = %e, "surface update failed");
                SurfaceOutcome::Failed(e)
            }
        }
    }

    async fn update_display_names<P: Platform>(
        &self,
        platform: &P,
        price: &FormattedPrice,
    ) -> Vec<(GroupId, SurfaceOutcome)> {
        // Membership is enumerated fresh every cycle, so groups joined or
        // left since the previous cycle are picked up without restarts.
        let groups = match platform.group_ids().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(surface = "display_name", error = %e, "could not enumerate groups");
                return Vec::new();
            }
        };

        let name = format!("{} {}", self.nickname_prefix, price.human);
        let mut outcomes = Vec::with_capacity(groups.len());
        for group in groups {
            let outcome = match platform.set_display_name(group, &name).await {
                Ok(()) => SurfaceOutcome::Updated,
                Err(e) => {
                    warn!(surface = "display_name", group, error = %e, "surface update failed");
                    SurfaceOutcome::Failed(e)
                }
            };
            outcomes.push((group, outcome));
        }
        outcomes
    }

    async fn update_channel<P: Platform>(
        &self,
        platform: &P,
        price: &FormattedPrice,
    ) -> SurfaceOutcome {
        let channel = match self.channel_id {
            Some(channel) => channel,
            None => return SurfaceOutcome::Skipped,
        };
        let name = format!("{}-{}", self.channel_prefix, price.channel);
        match platform.rename_channel(channel, &name).await {
            Ok(()) => SurfaceOutcome::Updated,
            Err(e) => {
                warn!(surface = "channel", channel, error = %e, "surface update failed");
                SurfaceOutcome::Failed(e)
            }
        }
    }
}
