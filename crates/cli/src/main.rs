mod health;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tickerbot_core::PriceFormatter;
use tickerbot_engine::{SurfaceUpdater, SyncConfig, SyncLoop};
use tickerbot_platform::DiscordConnection;
use tickerbot_quotes::CoinGeckoSource;

#[derive(Parser)]
#[command(name = "tickerbot")]
#[command(about = "Mirrors an asset price onto presence, nicknames, and a channel name")]
#[command(version)]
struct Cli {
    /// Bot token for the platform connection
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: String,

    /// Channel to rename with the price (the surface is skipped when absent)
    #[arg(long, env = "CHANNEL_ID")]
    channel_id: Option<u64>,

    /// Asset id on the quote provider
    #[arg(long, env = "ASSET_ID", default_value = "wemix-token")]
    asset_id: String,

    /// Currency to quote the price in
    #[arg(long, env = "VS_CURRENCY", default_value = "usd")]
    vs_currency: String,

    /// Seconds between update cycles (minimum 12: the platform allows 5 updates per 60s)
    #[arg(long, env = "UPDATE_INTERVAL_SECS", default_value = "30")]
    interval_secs: u64,

    /// Prefix for the presence label
    #[arg(long, env = "PRESENCE_PREFIX", default_value = "WEMIX at")]
    presence_prefix: String,

    /// Prefix for per-group display names
    #[arg(long, env = "NICKNAME_PREFIX", default_value = "WEMIX")]
    nickname_prefix: String,

    /// Prefix for the renamed channel (joined to the price with '-')
    #[arg(long, env = "CHANNEL_PREFIX", default_value = "📈-wemix")]
    channel_prefix: String,

    /// Currency symbol for human-facing labels
    #[arg(long, env = "CURRENCY_SYMBOL", default_value = "$")]
    currency_symbol: String,

    /// Bind address for the liveness endpoint (disabled when absent)
    #[arg(long, env = "HEALTH_BIND")]
    health_bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = SyncConfig {
        asset_id: cli.asset_id,
        vs_currency: cli.vs_currency,
        update_interval: Duration::from_secs(cli.interval_secs),
    };
    // Fail fast on a bad interval, before touching the network.
    config.validate()?;

    let surfaces = SurfaceUpdater {
        presence_prefix: cli.presence_prefix,
        nickname_prefix: cli.nickname_prefix,
        channel_prefix: cli.channel_prefix,
        channel_id: cli.channel_id,
    };
    if surfaces.channel_id.is_none() {
        tracing::warn!("no channel id configured, the channel surface will be skipped");
    }

    if let Some(bind) = cli.health_bind {
        tokio::spawn(async move {
            if let Err(e) = health::start_server(&bind).await {
                tracing::error!(error = %e, "liveness endpoint failed");
            }
        });
    }

    let platform = DiscordConnection::connect(&cli.token).await?;
    let source = CoinGeckoSource::new();
    let formatter = PriceFormatter::new(cli.currency_symbol);

    let sync = SyncLoop::new(source, platform, formatter, surfaces, config)?;
    let final_state = sync.run().await;
    tracing::info!(?final_state, "exiting");

    Ok(())
}
