//! Per-campaign background task and the handle that owns it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;

use super::engine_model::{compose_progress, CampaignProgress};
use crate::aggregation::{CachedAggregate, DonationAggregator};
use crate::donations::FeedHandle;
use crate::events::{DomainEvent, DomainEventSink};
use crate::goals::{GoalRegistry, GoalSlot};

/// Reacts to feed hints, goal changes, committed aggregates and refresh
/// timers for one open campaign, and publishes composed progress.
pub(crate) struct CampaignWorker {
    pub(crate) campaign_id: String,
    pub(crate) registry: Arc<GoalRegistry>,
    pub(crate) aggregator: Arc<DonationAggregator>,
    pub(crate) event_sink: Arc<dyn DomainEventSink>,
    pub(crate) forced_refresh_delay: Duration,
    pub(crate) refresh_interval: Option<Duration>,
    pub(crate) progress: watch::Sender<Option<CampaignProgress>>,
    /// Epoch whose goal-reached event was already emitted.
    pub(crate) reached_epoch: Option<DateTime<Utc>>,
}

impl CampaignWorker {
    pub(crate) async fn run(mut self, mut feed: FeedHandle) {
        let board = Arc::clone(self.registry.board());
        let mut goal_rx = board.subscribe(&self.campaign_id);
        let mut aggregate_rx = self.aggregator.subscribe(&self.campaign_id);

        self.reload_goal().await;
        self.aggregator.on_feed_event(&self.campaign_id);
        self.publish(&mut goal_rx, &mut aggregate_rx);

        let forced = tokio::time::sleep(self.forced_refresh_delay);
        tokio::pin!(forced);
        let mut forced_pending = true;
        let mut interval = self.refresh_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut feed_open = true;

        loop {
            tokio::select! {
                hint = feed.next_hint(), if feed_open => match hint {
                    Some(()) => self.aggregator.on_feed_event(&self.campaign_id),
                    None => {
                        warn!(
                            "Donation feed for campaign {} closed; relying on timed refreshes",
                            self.campaign_id
                        );
                        feed_open = false;
                    }
                },
                changed = goal_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.aggregator.on_feed_event(&self.campaign_id);
                    self.publish(&mut goal_rx, &mut aggregate_rx);
                }
                changed = aggregate_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.publish(&mut goal_rx, &mut aggregate_rx);
                }
                () = &mut forced, if forced_pending => {
                    forced_pending = false;
                    self.forced_refresh().await;
                }
                () = next_tick(&mut interval) => {
                    self.forced_refresh().await;
                }
            }
        }
        debug!("Campaign worker for {} stopped", self.campaign_id);
    }

    async fn reload_goal(&self) {
        if let Err(e) = self.registry.get_goal(&self.campaign_id).await {
            warn!(
                "Could not load goal for campaign {}; keeping last known: {}",
                self.campaign_id, e
            );
        }
    }

    /// Re-reads the goal and recomputes, whether or not a hint arrived.
    async fn forced_refresh(&self) {
        debug!("Forced refresh for campaign {}", self.campaign_id);
        self.reload_goal().await;
        self.aggregator.on_feed_event(&self.campaign_id);
    }

    fn publish(
        &mut self,
        goal_rx: &mut watch::Receiver<GoalSlot>,
        aggregate_rx: &mut watch::Receiver<Option<CachedAggregate>>,
    ) {
        let slot = goal_rx.borrow_and_update().clone();
        let cached = aggregate_rx.borrow_and_update().clone();
        let progress = compose_progress(&self.campaign_id, &slot, cached.as_ref());

        self.track_goal_reached(progress.as_ref());
        self.progress.send_if_modified(|current| {
            if *current == progress {
                return false;
            }
            *current = progress;
            // Pending states replace the old value without waking observers.
            current.is_some()
        });
    }

    fn track_goal_reached(&mut self, progress: Option<&CampaignProgress>) {
        let Some(progress) = progress else { return };
        let Some(goal) = &progress.goal else {
            self.reached_epoch = None;
            return;
        };
        if progress.percentage >= Decimal::ONE_HUNDRED {
            if self.reached_epoch != Some(goal.created_at) {
                self.reached_epoch = Some(goal.created_at);
                info!("Campaign {} reached its goal", self.campaign_id);
                self.event_sink
                    .emit(DomainEvent::goal_reached(self.campaign_id.as_str()));
            }
        } else if self.reached_epoch == Some(goal.created_at) {
            self.reached_epoch = None;
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// An open campaign. Dropping or closing it stops the background task and
/// unsubscribes from the donation feed.
#[derive(Debug)]
pub struct CampaignHandle {
    campaign_id: String,
    progress: watch::Receiver<Option<CampaignProgress>>,
    task: JoinHandle<()>,
}

impl CampaignHandle {
    pub(crate) fn new(
        campaign_id: impl Into<String>,
        progress: watch::Receiver<Option<CampaignProgress>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            progress,
            task,
        }
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    /// Latest progress, `None` while pending.
    pub fn current(&self) -> Option<CampaignProgress> {
        self.progress.borrow().clone()
    }

    /// Stream of progress values, starting with the current one if any.
    pub fn observe_progress(&self) -> BoxStream<'static, CampaignProgress> {
        WatchStream::new(self.progress.clone())
            .filter_map(|progress| async move { progress })
            .boxed()
    }

    /// Waits for the next published progress value.
    ///
    /// Returns `None` once the background task has stopped.
    pub async fn next_progress(&mut self) -> Option<CampaignProgress> {
        loop {
            self.progress.changed().await.ok()?;
            if let Some(progress) = self.progress.borrow_and_update().clone() {
                return Some(progress);
            }
        }
    }

    /// Stops the background task and waits for it to release the feed.
    pub async fn close(mut self) {
        self.task.abort();
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                warn!("Campaign worker for {} failed: {}", self.campaign_id, e);
            }
        }
        info!("Closed campaign {}", self.campaign_id);
    }
}

impl Drop for CampaignHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
