//! Aggregate totals and the pure summing step.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::donations::Donation;

/// Total donated to a campaign under one goal epoch.
///
/// Only meaningful while `goal_epoch` equals the live goal's `created_at`;
/// any other value is stale and must not be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTotal {
    pub campaign_id: String,
    pub goal_epoch: DateTime<Utc>,
    pub total: Decimal,
    pub included_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// Last committed aggregate of a campaign, as cached by the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAggregate {
    pub aggregate: AggregateTotal,
    /// Epoch token the aggregate was committed under.
    pub token: u64,
    /// Set when a later refresh failed; the value is the last known good one.
    pub possibly_stale: bool,
}

/// Sums the donations that count toward a goal whose epoch starts at
/// `epoch_start`.
///
/// A donation counts when its timestamp is at or after the epoch start. A
/// missing timestamp counts as `now`. Records with an unusable amount, or
/// tagged with another campaign, are skipped. The result does not depend on
/// the order of `donations`.
pub fn aggregate_donations(
    campaign_id: &str,
    donations: &[Donation],
    epoch_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AggregateTotal {
    let mut total = Decimal::ZERO;
    let mut included_count = 0usize;
    let mut skipped = 0usize;

    for donation in donations {
        if donation.campaign().is_some_and(|c| c != campaign_id) {
            skipped += 1;
            continue;
        }
        let Some(amount) = donation.valid_amount() else {
            skipped += 1;
            continue;
        };
        if donation.effective_created_at(now) < epoch_start {
            continue;
        }
        total = match total.checked_add(amount) {
            Some(sum) => sum,
            None => {
                warn!(
                    "Donation total overflowed for campaign {}; saturating",
                    campaign_id
                );
                Decimal::MAX
            }
        };
        included_count += 1;
    }

    if skipped > 0 {
        debug!(
            "Skipped {} malformed donation record(s) for campaign {}",
            skipped, campaign_id
        );
    }

    AggregateTotal {
        campaign_id: campaign_id.to_string(),
        goal_epoch: epoch_start,
        total,
        included_count,
        computed_at: now,
    }
}
