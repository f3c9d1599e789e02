use crate::errors::Result;
use crate::goals::goals_model::Goal;
use async_trait::async_trait;

/// Trait for goal document CRUD, keyed by campaign.
///
/// A campaign has at most one goal document, so `put_goal` overwrites.
/// Adapters may report a missing document either as `Ok(None)` or as
/// `StoreError::NotFound`; the registry treats both as "no goal".
#[async_trait]
pub trait GoalRepositoryTrait: Send + Sync {
    async fn get_goal(&self, campaign_id: &str) -> Result<Option<Goal>>;
    async fn put_goal(&self, goal: Goal) -> Result<Goal>;
    /// Returns false if no goal existed.
    async fn delete_goal(&self, campaign_id: &str) -> Result<bool>;
}
