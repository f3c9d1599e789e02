use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{BoxStream, StreamExt};
use log::{debug, info};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::campaign_worker::{CampaignHandle, CampaignWorker};
use super::engine_model::{compose_progress, CampaignProgress, EngineStores};
use crate::aggregation::{DonationAggregator, RefreshOutcome};
use crate::badges::{
    BadgeEvaluator, BadgeKind, BadgeState, BadgeStateSynchronizer, SaveOutcome,
};
use crate::config::EngineConfig;
use crate::donations::{Donation, DonationFeedTrait, DonationRepositoryTrait};
use crate::errors::{Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::goals::{Goal, GoalBoard, GoalFields, GoalRegistry};
use crate::utils::retry::{with_retry, RetryPolicy};

type BadgeSender = Arc<watch::Sender<Option<BadgeState>>>;

/// The goal-progress and badge-unlock engine.
///
/// An explicit context object: everything it shares between campaigns and
/// users lives here, and several engines can coexist in one process.
pub struct ProgressEngine {
    config: EngineConfig,
    retry: RetryPolicy,
    registry: Arc<GoalRegistry>,
    aggregator: Arc<DonationAggregator>,
    donations: Arc<dyn DonationRepositoryTrait>,
    feed: Arc<dyn DonationFeedTrait>,
    evaluator: BadgeEvaluator,
    synchronizer: BadgeStateSynchronizer,
    event_sink: Arc<dyn DomainEventSink>,
    badge_channels: Mutex<HashMap<String, BadgeSender>>,
    badge_cycles: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProgressEngine {
    /// Validates `config` and wires the components over `stores`.
    pub fn new(
        stores: EngineStores,
        config: EngineConfig,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let retry = config.retry_policy();
        let board = Arc::new(GoalBoard::new());
        let registry = Arc::new(GoalRegistry::new(
            stores.goals,
            Arc::clone(&board),
            retry,
            Arc::clone(&event_sink),
        ));
        let aggregator = Arc::new(DonationAggregator::new(
            Arc::clone(&stores.donations),
            board,
            retry,
            Arc::clone(&event_sink),
        ));
        let evaluator = BadgeEvaluator::from_config(&config);
        let synchronizer = BadgeStateSynchronizer::new(
            stores.remote_badges,
            stores.local_badges,
            evaluator.catalog(),
            retry,
            Arc::clone(&event_sink),
        );

        Ok(Self {
            config,
            retry,
            registry,
            aggregator,
            donations: stores.donations,
            feed: stores.feed,
            evaluator,
            synchronizer,
            event_sink,
            badge_channels: Mutex::new(HashMap::new()),
            badge_cycles: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &BadgeEvaluator {
        &self.evaluator
    }

    pub fn synchronizer(&self) -> &BadgeStateSynchronizer {
        &self.synchronizer
    }

    // ── Campaigns ─────────────────────────────────────────────────────────

    /// Starts tracking a campaign.
    ///
    /// Subscribes to its donation feed, loads the goal, kicks off the initial
    /// recompute and schedules the forced and periodic refreshes.
    pub fn open(&self, campaign_id: &str) -> Result<CampaignHandle> {
        if campaign_id.trim().is_empty() {
            return Err(ValidationError::MissingField("campaignId".to_string()).into());
        }
        let feed = self.feed.subscribe_donations(campaign_id)?;
        let (progress_tx, progress_rx) = watch::channel(None);

        let worker = CampaignWorker {
            campaign_id: campaign_id.to_string(),
            registry: Arc::clone(&self.registry),
            aggregator: Arc::clone(&self.aggregator),
            event_sink: Arc::clone(&self.event_sink),
            forced_refresh_delay: self.config.forced_refresh_delay(),
            refresh_interval: self.config.refresh_interval(),
            progress: progress_tx,
            reached_epoch: None,
        };
        let task = tokio::spawn(worker.run(feed));
        info!("Opened campaign {}", campaign_id);
        Ok(CampaignHandle::new(campaign_id, progress_rx, task))
    }

    /// Progress stream of an open campaign.
    pub fn observe_campaign_progress(
        &self,
        handle: &CampaignHandle,
    ) -> BoxStream<'static, CampaignProgress> {
        handle.observe_progress()
    }

    /// Progress from the current goal and cached aggregate, without
    /// touching the store. `None` while pending.
    pub fn progress_snapshot(&self, campaign_id: &str) -> Option<CampaignProgress> {
        let slot = self.registry.board().slot(campaign_id);
        compose_progress(
            campaign_id,
            &slot,
            self.aggregator.latest(campaign_id).as_ref(),
        )
    }

    /// Recomputes now on the caller's task. `None` if a refresh for the
    /// campaign was already running; it will do one more round.
    pub async fn refresh(&self, campaign_id: &str) -> Option<RefreshOutcome> {
        self.aggregator.refresh_now(campaign_id).await
    }

    pub async fn get_goal(&self, campaign_id: &str) -> Result<Option<Goal>> {
        self.registry.get_goal(campaign_id).await
    }

    pub async fn set_goal(&self, campaign_id: &str, fields: GoalFields) -> Result<Goal> {
        self.registry.set_goal(campaign_id, fields).await
    }

    pub async fn delete_goal(&self, campaign_id: &str) -> Result<bool> {
        self.registry.delete_goal(campaign_id).await
    }

    // ── Badges ────────────────────────────────────────────────────────────

    fn badge_sender(&self, user_id: &str) -> BadgeSender {
        let mut channels = self
            .badge_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(watch::channel(None).0))
            .clone()
    }

    fn badge_cycle(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut cycles = self
            .badge_cycles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cycles.entry(user_id.to_string()).or_default().clone()
    }

    /// Publishes a state to observers, merged with what they already saw.
    fn publish_badges(&self, user_id: &str, state: &BadgeState) {
        self.badge_sender(user_id).send_if_modified(|current| {
            let next = match current.as_ref() {
                Some(seen) => seen.merge(state),
                None => state.clone(),
            };
            if current.as_ref() == Some(&next) {
                return false;
            }
            *current = Some(next);
            true
        });
    }

    fn announce_unlocks(&self, user_id: &str, previous: &BadgeState, outcome: &SaveOutcome) {
        let unlocked = outcome.state.newly_unlocked(previous);
        if !unlocked.is_empty() {
            info!("User {} unlocked badges: {}", user_id, unlocked.join(", "));
            self.event_sink
                .emit(DomainEvent::badges_unlocked(user_id, unlocked));
        }
    }

    /// Stream of a user's badge state, starting with the persisted one.
    pub async fn observe_badges(&self, user_id: &str) -> BoxStream<'static, BadgeState> {
        let loaded = {
            let cycle = self.badge_cycle(user_id);
            let _guard = cycle.lock().await;
            self.synchronizer.load(user_id).await
        };
        self.publish_badges(user_id, &loaded);
        WatchStream::new(self.badge_sender(user_id).subscribe())
            .filter_map(|state| async move { state })
            .boxed()
    }

    /// Latest badge state published for the user, if any.
    pub fn current_badges(&self, user_id: &str) -> Option<BadgeState> {
        self.badge_sender(user_id).borrow().clone()
    }

    /// Re-evaluates a user's badges from their full donation history,
    /// persists the result and publishes it.
    ///
    /// Evaluated state is merged into the persisted one, so badges never
    /// re-lock even if the history shrank.
    pub async fn on_donation_history_changed(
        &self,
        user_id: &str,
        history: &[Donation],
    ) -> SaveOutcome {
        let cycle = self.badge_cycle(user_id);
        let _guard = cycle.lock().await;

        let persisted = self.synchronizer.load(user_id).await;
        let evaluated = self.evaluator.evaluate(history);
        let outcome = self
            .synchronizer
            .save(user_id, &persisted.merge(&evaluated))
            .await;
        debug!(
            "Badge cycle for {} finished ({:?})",
            user_id, outcome.status
        );

        self.announce_unlocks(user_id, &persisted, &outcome);
        self.publish_badges(user_id, &outcome.state);
        outcome
    }

    /// Queries the user's donation history and runs a badge cycle on it.
    pub async fn recompute_badges(&self, user_id: &str) -> Result<SaveOutcome> {
        let label = format!("query donations by {}", user_id);
        let history = with_retry(&self.retry, &label, || {
            self.donations.query_user_donations(user_id)
        })
        .await?;
        Ok(self.on_donation_history_changed(user_id, &history).await)
    }

    /// Accepts the external signal that a campaign the user supported
    /// reached its goal, unlocking the campaign-completion badges.
    pub async fn signal_campaign_completed(&self, user_id: &str) -> SaveOutcome {
        let cycle = self.badge_cycle(user_id);
        let _guard = cycle.lock().await;

        let persisted = self.synchronizer.load(user_id).await;
        let mut next = persisted.clone();
        for def in self.evaluator.catalog() {
            if def.kind == BadgeKind::CampaignCompletion {
                next.unlock(&def.id);
            }
        }
        let outcome = self.synchronizer.save(user_id, &next).await;

        self.announce_unlocks(user_id, &persisted, &outcome);
        self.publish_badges(user_id, &outcome.state);
        outcome
    }
}
