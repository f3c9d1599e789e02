//! Givetrack Core - goal progress and badge unlock engine.
//!
//! Aggregates a campaign's donations under the live goal's epoch, turns the
//! total into progress, and keeps per-user badge state in sync between a
//! local cache and a remote document store. Store access goes through the
//! traits in each domain module; `store` ships an in-memory adapter.

pub mod aggregation;
pub mod badges;
pub mod config;
pub mod constants;
pub mod donations;
pub mod engine;
pub mod errors;
pub mod events;
pub mod goals;
pub mod progress;
pub mod store;
pub mod utils;

pub use config::EngineConfig;
pub use engine::{CampaignHandle, CampaignProgress, EngineStores, ProgressEngine};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
