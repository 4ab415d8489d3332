use std::time::Duration;

use tickerbot_core::{Platform, PriceFormatter, QuoteSource};
use tracing::{info, warn};

use crate::state::{next_state, LoopEvent, LoopState};
use crate::surfaces::{CycleReport, SurfaceUpdater};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Documented platform ceiling on rename-style updates per rolling minute.
pub const PLATFORM_UPDATES_PER_MINUTE: u32 = 5;

/// Shortest update interval that keeps one-cycle-per-interval under the
/// platform ceiling.
pub const MIN_UPDATE_INTERVAL: Duration =
    Duration::from_secs(60 / PLATFORM_UPDATES_PER_MINUTE as u64);

/// Configuration errors caught before the loop ever starts.
#[derive(Debug, thiserror::Error)]
pub enum LoopConfigError {
    #[error("Update interval {0:?} is below the 12s minimum (the platform allows 5 updates per 60s)")]
    IntervalTooShort(Duration),
}

/// Cadence and quote identity for one deployment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Asset id on the quote provider.
    pub asset_id: String,
    /// Currency the price is quoted in.
    pub vs_currency: String,
    /// Sleep between cycles; the single rate-limit compliance knob.
    pub update_interval: Duration,
}

impl SyncConfig {
    /// Reject intervals that could breach the platform rate limit.
    pub fn validate(&self) -> Result<(), LoopConfigError> {
        if self.update_interval < MIN_UPDATE_INTERVAL {
            return Err(LoopConfigError::IntervalTooShort(self.update_interval));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sync loop
// ---------------------------------------------------------------------------

/// The fetch, format, propagate loop.
///
/// Cycles run strictly sequentially on a fixed interval. The loop never
/// reconnects: once the platform connection closes it stops, within one
/// interval at most.
pub struct SyncLoop<S, P> {
    source: S,
    platform: P,
    formatter: PriceFormatter,
    surfaces: SurfaceUpdater,
    config: SyncConfig,
    state: LoopState,
}

impl<S: QuoteSource, P: Platform> SyncLoop<S, P> {
    pub fn new(
        source: S,
        platform: P,
        formatter: PriceFormatter,
        surfaces: SurfaceUpdater,
        config: SyncConfig,
    ) -> Result<Self, LoopConfigError> {
        config.validate()?;
        Ok(Self {
            source,
            platform,
            formatter,
            surfaces,
            config,
            state: LoopState::AwaitingReady,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Drive the loop until the platform connection closes.
    pub async fn run(mut self) -> LoopState {
        info!(
            asset = %self.config.asset_id,
            currency = %self.config.vs_currency,
            interval = ?self.config.update_interval,
            "sync loop waiting for platform"
        );

        if !self.platform.wait_until_ready().await {
            warn!("platform connection closed before it became ready");
            self.state = next_state(self.state, LoopEvent::ConnectionClosed);
            return self.state;
        }
        self.state = next_state(self.state, LoopEvent::ConnectionReady);
        info!("platform ready, starting cycles");

        while self.state == LoopState::Running {
            if self.platform.is_closed() {
                self.state = next_state(self.state, LoopEvent::ConnectionClosed);
                break;
            }

            self.run_cycle().await;

            // The sleep is the only suspension point between cycles; closure
            // interrupts it so no new cycle starts on a dead connection. A
            // cycle already in flight is never aborted.
            let closed = tokio::select! {
                _ = self.platform.closed() => true,
                _ = tokio::time::sleep(self.config.update_interval) => false,
            };
            if closed {
                self.state = next_state(self.state, LoopEvent::ConnectionClosed);
            }
        }

        info!("sync loop stopped");
        self.state
    }

    /// One fetch, format, propagate pass.
    ///
    /// A fetch failure skips the surfaces entirely (stale values stay in
    /// place); surface failures are isolated per attempt inside the report.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let quote = match self
            .source
            .latest(&self.config.asset_id, &self.config.vs_currency)
            .await
        {
            Ok(quote) => quote,
            Err(e) => {
                warn!(asset = %self.config.asset_id, error = %e, "quote fetch failed, skipping cycle");
                return None;
            }
        };

        let price = self.formatter.format(quote.price);
        info!(asset = %quote.asset_id, price = %price.human, "updating surfaces");

        let report = self.surfaces.apply(&self.platform, &price).await;
        let failures = report.failures();
        if failures > 0 {
            warn!(failures, "cycle completed with isolated surface failures");
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use tickerbot_core::{FetchError, Quote};
    use tickerbot_platform::{SimulatedPlatform, SurfaceCall};

    struct SteadySource {
        price: Decimal,
        calls: Arc<AtomicUsize>,
    }

    impl SteadySource {
        fn new(price: Decimal) -> Self {
            Self {
                price,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for SteadySource {
        async fn latest(&self, asset_id: &str, vs_currency: &str) -> Result<Quote, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Quote::new(asset_id, vs_currency, self.price))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl QuoteSource for FailingSource {
        async fn latest(&self, _asset_id: &str, _vs_currency: &str) -> Result<Quote, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }
    }

    /// Fails the first `failures_left` fetches, then serves a steady price.
    struct RecoveringSource {
        failures_left: AtomicUsize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl QuoteSource for RecoveringSource {
        async fn latest(&self, asset_id: &str, vs_currency: &str) -> Result<Quote, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                Err(FetchError::Status(503))
            } else {
                Ok(Quote::new(asset_id, vs_currency, dec!(2)))
            }
        }
    }

    fn surfaces() -> SurfaceUpdater {
        SurfaceUpdater {
            presence_prefix: "WEMIX at".to_string(),
            nickname_prefix: "WEMIX".to_string(),
            channel_prefix: "📈-wemix".to_string(),
            channel_id: Some(10),
        }
    }

    fn config(interval: Duration) -> SyncConfig {
        SyncConfig {
            asset_id: "wemix-token".to_string(),
            vs_currency: "usd".to_string(),
            update_interval: interval,
        }
    }

    #[test]
    fn test_interval_below_minimum_is_rejected() {
        let err = config(Duration::from_secs(5)).validate().unwrap_err();
        assert!(matches!(err, LoopConfigError::IntervalTooShort(_)));

        assert!(config(MIN_UPDATE_INTERVAL).validate().is_ok());
        assert!(config(Duration::from_secs(30)).validate().is_ok());
    }

    #[tokio::test]
    async fn test_fetch_failure_touches_no_surfaces() {
        let platform = SimulatedPlatform::new(&[1]);
        let sync = SyncLoop::new(
            FailingSource,
            platform.clone(),
            PriceFormatter::default(),
            surfaces(),
            config(Duration::from_secs(30)),
        )
        .unwrap();

        let report = sync.run_cycle().await;

        assert!(report.is_none());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_formats_and_updates_every_surface() {
        let platform = SimulatedPlatform::new(&[1, 2]);
        let sync = SyncLoop::new(
            SteadySource::new(dec!(1234.5)),
            platform.clone(),
            PriceFormatter::default(),
            surfaces(),
            config(Duration::from_secs(30)),
        )
        .unwrap();

        let report = sync.run_cycle().await.unwrap();

        assert_eq!(report.failures(), 0);
        assert_eq!(
            platform.calls(),
            vec![
                SurfaceCall::Presence("WEMIX at $1,234.5000".to_string()),
                SurfaceCall::DisplayName(1, "WEMIX $1,234.5000".to_string()),
                SurfaceCall::DisplayName(2, "WEMIX $1,234.5000".to_string()),
                SurfaceCall::RenameChannel(10, "📈-wemix-1234-50".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failures_skip_cycles_until_the_provider_recovers() {
        let platform = SimulatedPlatform::new(&[1]);
        platform.close_after_presence(1);

        let source = RecoveringSource {
            failures_left: AtomicUsize::new(2),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let fetch_calls = Arc::clone(&source.calls);
        let sync = SyncLoop::new(
            source,
            platform.clone(),
            PriceFormatter::default(),
            surfaces(),
            config(Duration::from_secs(30)),
        )
        .unwrap();

        let final_state = sync.run().await;

        assert_eq!(final_state, LoopState::Stopped);
        // Two skipped cycles while the provider was down, then the first
        // good cycle ran every surface and the scripted closure stopped the
        // loop without cutting that cycle short.
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 3);
        assert_eq!(platform.presence_times().len(), 1);
        assert_eq!(platform.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_membership_changes_are_picked_up_next_cycle() {
        let platform = SimulatedPlatform::new(&[1]);
        let sync = SyncLoop::new(
            SteadySource::new(dec!(2)),
            platform.clone(),
            PriceFormatter::default(),
            surfaces(),
            config(Duration::from_secs(30)),
        )
        .unwrap();

        sync.run_cycle().await.unwrap();
        platform.set_guilds(&[1, 7]);
        let report = sync.run_cycle().await.unwrap();

        let groups: Vec<_> = report.display_names.iter().map(|(g, _)| *g).collect();
        assert_eq!(groups, vec![1, 7]);
    }

    #[tokio::test]
    async fn test_loop_stops_when_closed_before_ready() {
        let platform = SimulatedPlatform::unready(&[1]);
        platform.close();

        let source = SteadySource::new(dec!(1));
        let fetch_calls = Arc::clone(&source.calls);
        let sync = SyncLoop::new(
            source,
            platform,
            PriceFormatter::default(),
            surfaces(),
            config(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(sync.state(), LoopState::AwaitingReady);

        let final_state = sync.run().await;

        assert_eq!(final_state, LoopState::Stopped);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_spacing_never_breaches_the_rate_window() {
        let platform = SimulatedPlatform::new(&[1]);
        platform.close_after_presence(6);

        let sync = SyncLoop::new(
            SteadySource::new(dec!(1)),
            platform.clone(),
            PriceFormatter::default(),
            surfaces(),
            config(MIN_UPDATE_INTERVAL),
        )
        .unwrap();

        let final_state = sync.run().await;
        assert_eq!(final_state, LoopState::Stopped);

        let times = platform.presence_times();
        assert_eq!(times.len(), 6);
        // Any window holding a cycle and its fifth successor spans >= 60s,
        // so no rolling minute ever sees more than five update cycles.
        for pair in times.windows(6) {
            assert!(pair[5] - pair[0] >= Duration::from_secs(60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_within_one_interval_of_closure() {
        let interval = Duration::from_secs(30);
        let platform = SimulatedPlatform::new(&[1]);
        let sync = SyncLoop::new(
            SteadySource::new(dec!(1)),
            platform.clone(),
            PriceFormatter::default(),
            surfaces(),
            config(interval),
        )
        .unwrap();

        let handle = tokio::spawn(sync.run());

        // Let the first cycle land, then close mid-sleep.
        tokio::time::sleep(Duration::from_secs(5)).await;
        platform.close();
        let closed_at = tokio::time::Instant::now();

        let final_state = handle.await.unwrap();
        assert_eq!(final_state, LoopState::Stopped);
        assert!(closed_at.elapsed() <= interval);
        assert_eq!(platform.presence_times().len(), 1);
    }
}
