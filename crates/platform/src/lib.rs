//! Platform adapters.
//!
//! `discord` is the live adapter: a gateway session for presence and
//! lifecycle plus a REST client for the surfaces the gateway cannot reach.
//! `simulated` is an in-memory platform for exercising the sync loop
//! without a network.

pub mod discord;
pub mod simulated;

pub use discord::{ConnectError, DiscordConnection};
pub use simulated::{SimulatedPlatform, SurfaceCall};
