use crate::badges::badges_model::BadgeState;
use crate::errors::Result;
use async_trait::async_trait;

/// Trait for persisted badge state, keyed by user.
///
/// Implemented by both tiers: the authoritative remote store and the fast
/// local cache.
#[async_trait]
pub trait BadgeStateRepositoryTrait: Send + Sync {
    async fn get_badge_state(&self, user_id: &str) -> Result<Option<BadgeState>>;
    async fn put_badge_state(&self, user_id: &str, state: &BadgeState) -> Result<()>;
}
