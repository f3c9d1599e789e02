//! Badges module - catalog, evaluation from donation history, and state
//! synchronization between the local cache and the remote store.

mod badge_evaluator;
mod badge_sync;
mod badges_model;
mod badges_traits;

#[cfg(test)]
mod badge_sync_tests;

pub use badge_evaluator::BadgeEvaluator;
pub use badge_sync::{BadgeStateSynchronizer, SaveOutcome, SyncStatus};
pub use badges_model::{default_catalog, BadgeDefinition, BadgeKind, BadgeState, BadgeStatus};
pub use badges_traits::BadgeStateRepositoryTrait;
