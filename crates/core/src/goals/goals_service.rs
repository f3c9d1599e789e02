use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::goal_board::GoalBoard;
use super::goals_model::{Goal, GoalFields};
use super::goals_traits::GoalRepositoryTrait;
use crate::errors::Result;
use crate::events::{DomainEvent, DomainEventSink};
use crate::utils::retry::{with_retry, RetryPolicy};
use crate::utils::time_utils::{next_epoch_after, now_millis};

/// Owns the live goal of each campaign.
///
/// Mutations go through the repository first and are then published on the
/// [`GoalBoard`], which bumps the campaign's epoch token.
pub struct GoalRegistry {
    repository: Arc<dyn GoalRepositoryTrait>,
    board: Arc<GoalBoard>,
    retry: RetryPolicy,
    event_sink: Arc<dyn DomainEventSink>,
    // Serializes admin mutations so two concurrent creates cannot both see
    // "no goal" and start two epochs.
    write_lock: Mutex<()>,
}

impl GoalRegistry {
    pub fn new(
        repository: Arc<dyn GoalRepositoryTrait>,
        board: Arc<GoalBoard>,
        retry: RetryPolicy,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            repository,
            board,
            retry,
            event_sink,
            write_lock: Mutex::new(()),
        }
    }

    pub fn board(&self) -> &Arc<GoalBoard> {
        &self.board
    }

    async fn read_goal(&self, campaign_id: &str) -> Result<Option<Goal>> {
        let label = format!("get goal {}", campaign_id);
        match with_retry(&self.retry, &label, || self.repository.get_goal(campaign_id)).await {
            Ok(goal) => Ok(goal),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetches the live goal. Absence is `Ok(None)`.
    ///
    /// A successful read is recorded on the board; a failed one leaves the
    /// board untouched so a transient error never looks like a deletion.
    /// When a mutation lands while the read is in flight, the board wins and
    /// its goal is returned instead of the outdated read.
    pub async fn get_goal(&self, campaign_id: &str) -> Result<Option<Goal>> {
        let read_token = self.board.current_token(campaign_id);
        let goal = self.read_goal(campaign_id).await?;
        let slot = self.board.observe(campaign_id, goal, read_token);
        Ok(slot.goal)
    }

    /// Creates the campaign goal, or edits it in place when one is live.
    ///
    /// Edits keep `created_at`, so the aggregation cutover does not move.
    pub async fn set_goal(&self, campaign_id: &str, fields: GoalFields) -> Result<Goal> {
        fields.validate()?;
        let _guard = self.write_lock.lock().await;

        let now = now_millis();
        let existing = self.read_goal(campaign_id).await?;
        let new_epoch = existing.is_none();
        let goal = match existing {
            Some(mut goal) => {
                goal.apply(fields, now);
                goal
            }
            None => {
                let created_at = next_epoch_after(self.board.highest_epoch(campaign_id), now);
                Goal {
                    id: Uuid::new_v4().to_string(),
                    campaign_id: campaign_id.to_string(),
                    title: fields.title.trim().to_string(),
                    description: fields.description,
                    target_amount: fields.target_amount,
                    created_at,
                    updated_at: created_at,
                    end_date: fields.end_date,
                }
            }
        };

        let label = format!("put goal {}", campaign_id);
        let saved = with_retry(&self.retry, &label, || {
            self.repository.put_goal(goal.clone())
        })
        .await?;

        let slot = self.board.publish(campaign_id, Some(saved.clone()));
        if new_epoch {
            info!(
                "Created goal for campaign {} (epoch {}, token {})",
                campaign_id, saved.created_at, slot.token
            );
        } else {
            debug!(
                "Updated goal for campaign {} (token {})",
                campaign_id, slot.token
            );
        }
        self.event_sink
            .emit(DomainEvent::goal_changed(campaign_id, new_epoch));
        Ok(saved)
    }

    /// Removes the live goal. Returns false if there was none.
    pub async fn delete_goal(&self, campaign_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let label = format!("delete goal {}", campaign_id);
        let existed = match with_retry(&self.retry, &label, || {
            self.repository.delete_goal(campaign_id)
        })
        .await
        {
            Ok(existed) => existed,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };

        self.board.publish(campaign_id, None);
        if existed {
            info!("Deleted goal for campaign {}", campaign_id);
            self.event_sink.emit(DomainEvent::goal_deleted(campaign_id));
        }
        Ok(existed)
    }
}
