//! Progress module - pure percentage and tier calculations.

mod progress_calculator;

pub use progress_calculator::{display_percentage, progress_percentage, tier, ProgressTier};
