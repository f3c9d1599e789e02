//! Per-campaign goal state shared between the registry and the aggregator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::watch;

use super::goals_model::{Goal, GoalSlot};

/// Publishes the live goal and the epoch token of every campaign.
///
/// The token only grows. Every registry mutation bumps it, and reads that
/// reveal a different goal bump it too, so a computation started under an
/// older token can tell its result is stale.
#[derive(Default)]
pub struct GoalBoard {
    slots: Mutex<HashMap<String, Arc<watch::Sender<GoalSlot>>>>,
}

impl GoalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, campaign_id: &str) -> Arc<watch::Sender<GoalSlot>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(campaign_id.to_string())
            .or_insert_with(|| Arc::new(watch::channel(GoalSlot::default()).0))
            .clone()
    }

    /// Receives every published change for the campaign.
    pub fn subscribe(&self, campaign_id: &str) -> watch::Receiver<GoalSlot> {
        self.sender(campaign_id).subscribe()
    }

    /// Snapshot of the campaign's slot.
    pub fn slot(&self, campaign_id: &str) -> GoalSlot {
        self.sender(campaign_id).borrow().clone()
    }

    pub fn current_token(&self, campaign_id: &str) -> u64 {
        self.sender(campaign_id).borrow().token
    }

    /// Highest goal epoch ever seen for the campaign.
    pub fn highest_epoch(&self, campaign_id: &str) -> Option<DateTime<Utc>> {
        self.sender(campaign_id).borrow().highest_epoch
    }

    /// Records a goal mutation. Always bumps the token.
    pub fn publish(&self, campaign_id: &str, goal: Option<Goal>) -> GoalSlot {
        let sender = self.sender(campaign_id);
        let mut published = GoalSlot::default();
        sender.send_modify(|slot| {
            slot.token += 1;
            slot.loaded = true;
            raise_highest(slot, goal.as_ref());
            slot.goal = goal;
            published = slot.clone();
        });
        debug!(
            "goal board: campaign {} now at token {}",
            campaign_id, published.token
        );
        published
    }

    /// Records the result of a goal read that started at `read_token`.
    ///
    /// Bumps the token only when the read differs from what the board holds.
    /// A read overtaken by a mutation (the token moved while it was in
    /// flight) is dropped and the board is returned unchanged.
    pub fn observe(&self, campaign_id: &str, goal: Option<Goal>, read_token: u64) -> GoalSlot {
        let sender = self.sender(campaign_id);
        let mut observed = GoalSlot::default();
        sender.send_if_modified(|slot| {
            if slot.token != read_token {
                debug!(
                    "goal board: dropping read of campaign {} started at token {} (now {})",
                    campaign_id, read_token, slot.token
                );
                observed = slot.clone();
                return false;
            }
            let changed = !slot.loaded || slot.goal != goal;
            if changed {
                slot.token += 1;
                slot.loaded = true;
                raise_highest(slot, goal.as_ref());
                slot.goal = goal;
            }
            observed = slot.clone();
            changed
        });
        observed
    }
}

fn raise_highest(slot: &mut GoalSlot, goal: Option<&Goal>) {
    if let Some(goal) = goal {
        if slot.highest_epoch.map_or(true, |h| goal.created_at > h) {
            slot.highest_epoch = Some(goal.created_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn goal_at(created_at: DateTime<Utc>) -> Goal {
        Goal {
            id: "g".into(),
            campaign_id: "camp-1".into(),
            title: "Goal".into(),
            description: None,
            target_amount: dec!(100),
            created_at,
            updated_at: created_at,
            end_date: None,
        }
    }

    #[test]
    fn test_publish_always_bumps() {
        let board = GoalBoard::new();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(board.current_token("camp-1"), 0);
        assert!(!board.slot("camp-1").loaded);

        board.publish("camp-1", Some(goal_at(t0)));
        board.publish("camp-1", Some(goal_at(t0)));
        assert_eq!(board.current_token("camp-1"), 2);

        let slot = board.publish("camp-1", None);
        assert_eq!(slot.token, 3);
        assert!(slot.goal.is_none());
        assert!(slot.loaded);
        assert_eq!(slot.highest_epoch, Some(t0));
    }

    #[test]
    fn test_observe_bumps_only_on_difference() {
        let board = GoalBoard::new();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        // First read marks the slot loaded even when there is no goal.
        assert_eq!(board.observe("camp-1", None, 0).token, 1);
        assert_eq!(board.observe("camp-1", None, 1).token, 1);
        assert_eq!(board.observe("camp-1", Some(goal_at(t0)), 1).token, 2);
        assert_eq!(board.observe("camp-1", Some(goal_at(t0)), 2).token, 2);
    }

    #[test]
    fn test_observe_drops_read_overtaken_by_mutation() {
        let board = GoalBoard::new();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::days(3);
        board.publish("camp-1", Some(goal_at(t0)));
        let read_token = board.current_token("camp-1");

        board.publish("camp-1", None);
        board.publish("camp-1", Some(goal_at(t1)));

        let slot = board.observe("camp-1", Some(goal_at(t0)), read_token);
        assert_eq!(slot.token, 3);
        assert_eq!(slot.goal.map(|g| g.created_at), Some(t1));
        assert_eq!(board.slot("camp-1").token, 3);
    }

    #[test]
    fn test_highest_epoch_never_decreases() {
        let board = GoalBoard::new();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        board.publish("camp-1", Some(goal_at(t0 + Duration::days(1))));
        board.publish("camp-1", Some(goal_at(t0)));
        assert_eq!(board.highest_epoch("camp-1"), Some(t0 + Duration::days(1)));
    }

    #[test]
    fn test_campaigns_are_independent() {
        let board = GoalBoard::new();
        board.publish("camp-1", None);
        assert_eq!(board.current_token("camp-1"), 1);
        assert_eq!(board.current_token("camp-2"), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let board = GoalBoard::new();
        let mut rx = board.subscribe("camp-1");
        board.publish("camp-1", None);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().token, 1);
    }
}
