//! Percentage and motivational tier for campaign progress.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Discrete progress bands, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTier {
    EncourageFirstSupport,
    GoodStart,
    Halfway,
    AlmostThere,
    GoalReached,
}

impl ProgressTier {
    /// Band for an exact percentage. Lower bounds are inclusive.
    pub fn from_percentage(percentage: Decimal) -> Self {
        if percentage >= HUNDRED {
            ProgressTier::GoalReached
        } else if percentage >= Decimal::from(75) {
            ProgressTier::AlmostThere
        } else if percentage >= Decimal::from(50) {
            ProgressTier::Halfway
        } else if percentage >= Decimal::from(25) {
            ProgressTier::GoodStart
        } else {
            ProgressTier::EncourageFirstSupport
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ProgressTier::GoalReached => "goal reached",
            ProgressTier::AlmostThere => "almost there",
            ProgressTier::Halfway => "halfway",
            ProgressTier::GoodStart => "good start",
            ProgressTier::EncourageFirstSupport => "encourage first support",
        }
    }
}

/// Shorthand for [`ProgressTier::from_percentage`].
pub fn tier(percentage: Decimal) -> ProgressTier {
    ProgressTier::from_percentage(percentage)
}

/// Exact `min(100, total / target * 100)`, floored at zero.
///
/// No rounding happens here; tier thresholds compare against this value.
pub fn progress_percentage(total: Decimal, target: Decimal) -> Decimal {
    if target <= Decimal::ZERO || total <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    total
        .checked_mul(HUNDRED)
        .and_then(|scaled| scaled.checked_div(target))
        .unwrap_or(HUNDRED)
        .min(HUNDRED)
}

/// Integer percentage for presentation, rounding half away from zero.
pub fn display_percentage(percentage: Decimal) -> u32 {
    percentage
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
        .min(100)
}
