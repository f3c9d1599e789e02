//! Engine module - the context object tying goals, aggregation, progress
//! and badges together, and the per-campaign handles it hands out.

mod campaign_worker;
mod engine_model;
mod progress_engine;


pub use campaign_worker::CampaignHandle;
pub use engine_model::{compose_progress, CampaignProgress, EngineStores};
pub use progress_engine::ProgressEngine;
