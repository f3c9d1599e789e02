//! Domain event types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Domain events emitted by the engine after state changes.
///
/// Host adapters translate them into platform actions (push notifications,
/// analytics, signalling campaign completion to donors).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A goal was created or edited.
    GoalChanged {
        campaign_id: String,
        /// True when the goal was newly created, i.e. a new epoch started.
        new_epoch: bool,
    },

    /// The live goal of a campaign was deleted.
    GoalDeleted { campaign_id: String },

    /// A recomputation committed a new aggregate total.
    AggregateUpdated {
        campaign_id: String,
        total: Decimal,
    },

    /// Campaign progress crossed 100% under the current goal.
    GoalReached { campaign_id: String },

    /// Badges switched from locked to unlocked for a user.
    BadgesUnlocked {
        user_id: String,
        badge_ids: Vec<String>,
    },

    /// Badge state was kept locally because the remote write failed.
    BadgeSyncPending { user_id: String },
}

impl DomainEvent {
    /// Creates a GoalChanged event.
    pub fn goal_changed(campaign_id: impl Into<String>, new_epoch: bool) -> Self {
        Self::GoalChanged {
            campaign_id: campaign_id.into(),
            new_epoch,
        }
    }

    /// Creates a GoalDeleted event.
    pub fn goal_deleted(campaign_id: impl Into<String>) -> Self {
        Self::GoalDeleted {
            campaign_id: campaign_id.into(),
        }
    }

    /// Creates an AggregateUpdated event.
    pub fn aggregate_updated(campaign_id: impl Into<String>, total: Decimal) -> Self {
        Self::AggregateUpdated {
            campaign_id: campaign_id.into(),
            total,
        }
    }

    /// Creates a GoalReached event.
    pub fn goal_reached(campaign_id: impl Into<String>) -> Self {
        Self::GoalReached {
            campaign_id: campaign_id.into(),
        }
    }

    /// Creates a BadgesUnlocked event.
    pub fn badges_unlocked(user_id: impl Into<String>, badge_ids: Vec<String>) -> Self {
        Self::BadgesUnlocked {
            user_id: user_id.into(),
            badge_ids,
        }
    }

    /// Creates a BadgeSyncPending event.
    pub fn badge_sync_pending(user_id: impl Into<String>) -> Self {
        Self::BadgeSyncPending {
            user_id: user_id.into(),
        }
    }
}
