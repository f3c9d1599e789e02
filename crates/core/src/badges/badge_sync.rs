use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::badges_model::{BadgeDefinition, BadgeState};
use super::badges_traits::BadgeStateRepositoryTrait;
use crate::events::{DomainEvent, DomainEventSink};
use crate::utils::retry::{with_retry, RetryPolicy};

/// Where a saved state ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Written to the remote store (and the local cache).
    Synced,
    /// Written locally only; the remote write will be retried.
    PendingRemoteSync,
    /// Neither tier accepted the write.
    Unpersisted,
}

/// Result of [`BadgeStateSynchronizer::save`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// The state actually persisted, after merging with what was cached.
    pub state: BadgeState,
    pub status: SyncStatus,
}

/// Keeps badge state consistent between the local cache and the remote
/// store.
///
/// Writes go to the remote store first and then to the cache. A failed
/// remote write leaves the user marked as pending, and the next `load` or
/// `save` for that user pushes the cached state again. States are only ever
/// merged, so an unlocked badge stays unlocked.
pub struct BadgeStateSynchronizer {
    remote: Arc<dyn BadgeStateRepositoryTrait>,
    local: Arc<dyn BadgeStateRepositoryTrait>,
    retry: RetryPolicy,
    default_state: BadgeState,
    pending: Mutex<HashSet<String>>,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl BadgeStateSynchronizer {
    pub fn new(
        remote: Arc<dyn BadgeStateRepositoryTrait>,
        local: Arc<dyn BadgeStateRepositoryTrait>,
        catalog: &[BadgeDefinition],
        retry: RetryPolicy,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            remote,
            local,
            retry,
            default_state: BadgeState::all_locked(catalog),
            pending: Mutex::new(HashSet::new()),
            user_locks: Mutex::new(HashMap::new()),
            event_sink,
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// True while the user's latest state has not reached the remote store.
    pub fn is_pending(&self, user_id: &str) -> bool {
        self.pending().contains(user_id)
    }

    /// All-locked state covering the whole catalog.
    pub fn default_state(&self) -> &BadgeState {
        &self.default_state
    }

    async fn read_local(&self, user_id: &str) -> Option<BadgeState> {
        let label = format!("read cached badges {}", user_id);
        match with_retry(&self.retry, &label, || self.local.get_badge_state(user_id)).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Local badge cache unreadable for {}: {}", user_id, e);
                None
            }
        }
    }

    async fn write_local(&self, user_id: &str, state: &BadgeState) -> bool {
        let label = format!("cache badges {}", user_id);
        match with_retry(&self.retry, &label, || self.local.put_badge_state(user_id, state)).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to cache badges for {}: {}", user_id, e);
                false
            }
        }
    }

    async fn write_remote(&self, user_id: &str, state: &BadgeState) -> bool {
        let label = format!("store badges {}", user_id);
        match with_retry(&self.retry, &label, || self.remote.put_badge_state(user_id, state)).await {
            Ok(()) => {
                self.pending().remove(user_id);
                true
            }
            Err(e) => {
                warn!(
                    "Remote badge write failed for {}; keeping it pending: {}",
                    user_id, e
                );
                self.pending().insert(user_id.to_string());
                false
            }
        }
    }

    /// Loads a user's badge state. Never fails.
    ///
    /// Remote first, merged with any locally cached unlocks that did not
    /// reach the remote store yet. Falls back to the cache when the remote
    /// store is unreachable, and to an all-locked state when both are.
    pub async fn load(&self, user_id: &str) -> BadgeState {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let local = self.read_local(user_id).await;
        let label = format!("load badges {}", user_id);
        let remote = match with_retry(&self.retry, &label, || self.remote.get_badge_state(user_id)).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(
                    "Remote badge state unavailable for {}, using local cache: {}",
                    user_id, e
                );
                return match local {
                    Some(cached) => self.default_state.merge(&cached),
                    None => self.default_state.clone(),
                };
            }
        };

        let mut merged = self.default_state.clone();
        if let Some(remote) = &remote {
            merged = merged.merge(remote);
        }
        if let Some(cached) = &local {
            merged = merged.merge(cached);
        }

        let remote_behind = match (&remote, &local) {
            (Some(r), Some(l)) => !r.covers(l),
            (None, Some(l)) => !l.unlocked_ids().is_empty(),
            _ => false,
        };
        if self.is_pending(user_id) || remote_behind {
            debug!("Pushing cached badge state for {} to remote", user_id);
            self.write_remote(user_id, &merged).await;
        }
        if local.as_ref() != Some(&merged) {
            self.write_local(user_id, &merged).await;
        }
        merged
    }

    /// Persists a user's badge state, remote first.
    ///
    /// The state is merged with the cached one before writing, so saving can
    /// never re-lock a badge. Saving an unchanged state is a no-op.
    pub async fn save(&self, user_id: &str, state: &BadgeState) -> SaveOutcome {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let local = self.read_local(user_id).await;
        let mut merged = self.default_state.clone();
        if let Some(cached) = &local {
            merged = merged.merge(cached);
        }
        merged = merged.merge(state);

        if !self.is_pending(user_id) && local.as_ref() == Some(&merged) {
            return SaveOutcome {
                state: merged,
                status: SyncStatus::Synced,
            };
        }

        let remote_ok = self.write_remote(user_id, &merged).await;
        let local_ok = self.write_local(user_id, &merged).await;

        let status = match (remote_ok, local_ok) {
            (true, _) => SyncStatus::Synced,
            (false, true) => {
                self.event_sink.emit(DomainEvent::badge_sync_pending(user_id));
                SyncStatus::PendingRemoteSync
            }
            (false, false) => SyncStatus::Unpersisted,
        };
        SaveOutcome {
            state: merged,
            status,
        }
    }
}
