#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::badges::{
        default_catalog, BadgeState, BadgeStateRepositoryTrait, BadgeStateSynchronizer,
        SyncStatus,
    };
    use crate::config::EngineConfig;
    use crate::constants::*;
    use crate::events::{DomainEvent, MockDomainEventSink};
    use crate::store::InMemoryDocumentStore;
    use crate::utils::RetryPolicy;

    struct Fixture {
        remote: InMemoryDocumentStore,
        local: InMemoryDocumentStore,
        sink: MockDomainEventSink,
        sync: BadgeStateSynchronizer,
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            timeout: Duration::from_secs(1),
        }
    }

    fn fixture() -> Fixture {
        let remote = InMemoryDocumentStore::new();
        let local = InMemoryDocumentStore::new();
        let sink = MockDomainEventSink::new();
        let sync = BadgeStateSynchronizer::new(
            Arc::new(remote.clone()),
            Arc::new(local.clone()),
            &default_catalog(&EngineConfig::default()),
            fast_retry(),
            Arc::new(sink.clone()),
        );
        Fixture {
            remote,
            local,
            sink,
            sync,
        }
    }

    fn unlocked(ids: &[&str]) -> BadgeState {
        let mut state = BadgeState::default();
        for id in ids {
            state.unlock(id);
        }
        state
    }

    #[tokio::test]
    async fn test_load_defaults_to_all_locked() {
        let f = fixture();
        let state = f.sync.load("user-1").await;
        assert_eq!(state.badges.len(), 5);
        assert!(state.unlocked_ids().is_empty());
    }

    #[tokio::test]
    async fn test_load_with_both_tiers_down_returns_default() {
        let f = fixture();
        f.remote.set_offline(true);
        f.local.set_offline(true);
        let state = f.sync.load("user-1").await;
        assert_eq!(&state, f.sync.default_state());
    }

    #[tokio::test]
    async fn test_save_writes_remote_then_local() {
        let f = fixture();
        let outcome = f.sync.save("user-1", &unlocked(&[BADGE_FIRST_DONATION])).await;

        assert_eq!(outcome.status, SyncStatus::Synced);
        assert!(outcome.state.is_unlocked(BADGE_FIRST_DONATION));
        assert_eq!(outcome.state.badges.len(), 5);

        let remote = f.remote.get_badge_state("user-1").await.unwrap().unwrap();
        let local = f.local.get_badge_state("user-1").await.unwrap().unwrap();
        assert_eq!(remote, outcome.state);
        assert_eq!(local, outcome.state);
        assert!(!f.sync.is_pending("user-1"));
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_state_locally_and_marks_pending() {
        let f = fixture();
        f.remote.set_offline(true);

        let outcome = f.sync.save("user-1", &unlocked(&[BADGE_GENEROUS_DONOR])).await;
        assert_eq!(outcome.status, SyncStatus::PendingRemoteSync);
        assert!(f.sync.is_pending("user-1"));
        assert!(f
            .sink
            .events()
            .contains(&DomainEvent::badge_sync_pending("user-1")));

        let loaded = f.sync.load("user-1").await;
        assert!(loaded.is_unlocked(BADGE_GENEROUS_DONOR));
        assert!(f.sync.is_pending("user-1"));
    }

    #[tokio::test]
    async fn test_pending_state_is_pushed_on_next_load() {
        let f = fixture();
        f.remote.set_offline(true);
        f.sync.save("user-1", &unlocked(&[BADGE_LOYAL_SUPPORTER])).await;
        f.remote.set_offline(false);

        let loaded = f.sync.load("user-1").await;
        assert!(loaded.is_unlocked(BADGE_LOYAL_SUPPORTER));
        assert!(!f.sync.is_pending("user-1"));

        let remote = f.remote.get_badge_state("user-1").await.unwrap().unwrap();
        assert!(remote.is_unlocked(BADGE_LOYAL_SUPPORTER));
    }

    #[tokio::test]
    async fn test_load_merges_remote_and_local_without_relocking() {
        let f = fixture();
        f.remote
            .put_badge_state("user-1", &unlocked(&[BADGE_FIRST_DONATION]))
            .await
            .unwrap();
        f.local
            .put_badge_state("user-1", &unlocked(&[BADGE_CAMPAIGN_CHAMPION]))
            .await
            .unwrap();

        let loaded = f.sync.load("user-1").await;
        assert!(loaded.is_unlocked(BADGE_FIRST_DONATION));
        assert!(loaded.is_unlocked(BADGE_CAMPAIGN_CHAMPION));

        let remote = f.remote.get_badge_state("user-1").await.unwrap().unwrap();
        let local = f.local.get_badge_state("user-1").await.unwrap().unwrap();
        assert_eq!(remote, loaded);
        assert_eq!(local, loaded);
    }

    #[tokio::test]
    async fn test_save_never_relocks() {
        let f = fixture();
        f.sync.save("user-1", &unlocked(&[BADGE_FIRST_DONATION])).await;
        let outcome = f.sync.save("user-1", &BadgeState::default()).await;
        assert!(outcome.state.is_unlocked(BADGE_FIRST_DONATION));
    }

    #[tokio::test]
    async fn test_saving_unchanged_state_does_not_write() {
        let f = fixture();
        let state = unlocked(&[BADGE_FIRST_DONATION]);
        f.sync.save("user-1", &state).await;

        // Any write would fail and leave the user pending.
        f.remote.fail_next_writes(10);
        let outcome = f.sync.save("user-1", &state).await;
        assert_eq!(outcome.status, SyncStatus::Synced);
        assert!(!f.sync.is_pending("user-1"));
    }

    #[tokio::test]
    async fn test_both_tiers_failing_is_unpersisted() {
        let f = fixture();
        f.remote.set_offline(true);
        f.local.set_offline(true);

        let outcome = f.sync.save("user-1", &unlocked(&[BADGE_FIRST_DONATION])).await;
        assert_eq!(outcome.status, SyncStatus::Unpersisted);
        assert!(f.sync.is_pending("user-1"));
        assert!(f.sink.is_empty());
    }

    #[tokio::test]
    async fn test_transient_remote_failure_is_retried() {
        let f = fixture();
        f.remote.fail_next_writes(1);
        let outcome = f.sync.save("user-1", &unlocked(&[BADGE_FIRST_DONATION])).await;
        assert_eq!(outcome.status, SyncStatus::Synced);
    }
}
