//! Engine-facing models: the progress snapshot and the store bundle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregation::CachedAggregate;
use crate::badges::BadgeStateRepositoryTrait;
use crate::donations::{DonationFeedTrait, DonationRepositoryTrait};
use crate::goals::{Goal, GoalRepositoryTrait, GoalSlot};
use crate::progress::{display_percentage, progress_percentage, tier, ProgressTier};
use crate::store::InMemoryDocumentStore;

/// What a campaign screen shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignProgress {
    pub campaign_id: String,
    /// Live goal; `None` means the campaign has no goal.
    pub goal: Option<Goal>,
    pub total: Decimal,
    pub included_count: usize,
    /// Exact percentage in `[0, 100]`.
    pub percentage: Decimal,
    pub display_percentage: u32,
    pub tier: ProgressTier,
    /// The total is the last known good one; a later refresh failed.
    pub possibly_stale: bool,
    pub computed_at: Option<DateTime<Utc>>,
}

impl CampaignProgress {
    /// State shown when the campaign has no live goal.
    pub fn no_goal(campaign_id: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            goal: None,
            total: Decimal::ZERO,
            included_count: 0,
            percentage: Decimal::ZERO,
            display_percentage: 0,
            tier: ProgressTier::EncourageFirstSupport,
            possibly_stale: false,
            computed_at: None,
        }
    }

    pub fn has_goal(&self) -> bool {
        self.goal.is_some()
    }

    pub fn is_goal_reached(&self) -> bool {
        self.has_goal() && self.tier == ProgressTier::GoalReached
    }
}

/// Combines the goal slot and the cached aggregate into a progress value.
///
/// Returns `None` while nothing trustworthy can be shown: before the goal
/// was first loaded, and after an epoch change until an aggregate computed
/// under the new epoch exists.
pub fn compose_progress(
    campaign_id: &str,
    slot: &GoalSlot,
    cached: Option<&CachedAggregate>,
) -> Option<CampaignProgress> {
    if !slot.loaded {
        return None;
    }
    let Some(goal) = &slot.goal else {
        return Some(CampaignProgress::no_goal(campaign_id));
    };
    let cached = cached.filter(|c| c.aggregate.goal_epoch == goal.created_at)?;

    let percentage = progress_percentage(cached.aggregate.total, goal.target_amount);
    Some(CampaignProgress {
        campaign_id: campaign_id.to_string(),
        goal: Some(goal.clone()),
        total: cached.aggregate.total,
        included_count: cached.aggregate.included_count,
        percentage,
        display_percentage: display_percentage(percentage),
        tier: tier(percentage),
        possibly_stale: cached.possibly_stale,
        computed_at: Some(cached.aggregate.computed_at),
    })
}

/// Store adapters the engine reads and writes through.
#[derive(Clone)]
pub struct EngineStores {
    pub donations: Arc<dyn DonationRepositoryTrait>,
    pub feed: Arc<dyn DonationFeedTrait>,
    pub goals: Arc<dyn GoalRepositoryTrait>,
    /// Authoritative badge store.
    pub remote_badges: Arc<dyn BadgeStateRepositoryTrait>,
    /// Device-local badge cache.
    pub local_badges: Arc<dyn BadgeStateRepositoryTrait>,
}

impl EngineStores {
    /// Wires every remote concern to `remote` and the badge cache to `local`.
    pub fn in_memory(remote: &InMemoryDocumentStore, local: &InMemoryDocumentStore) -> Self {
        Self {
            donations: Arc::new(remote.clone()),
            feed: Arc::new(remote.clone()),
            goals: Arc::new(remote.clone()),
            remote_badges: Arc::new(remote.clone()),
            local_badges: Arc::new(local.clone()),
        }
    }
}
