use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use tokio::sync::watch;

use super::aggregate_model::{aggregate_donations, AggregateTotal, CachedAggregate};
use super::single_flight::{FlightGuard, SingleFlight};
use crate::donations::DonationRepositoryTrait;
use crate::errors::{Error, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::goals::{GoalBoard, GoalEpoch};
use crate::utils::retry::{with_retry, RetryPolicy};
use crate::utils::time_utils::now_millis;

type AggregateSender = Arc<watch::Sender<Option<CachedAggregate>>>;

/// What one refresh round did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new aggregate was committed (or confirmed unchanged).
    Committed,
    /// The epoch moved during the computation; result dropped, rerun queued.
    Discarded,
    /// The snapshot read failed; the previous value was kept.
    Failed,
    /// No live goal, nothing to aggregate.
    Skipped,
}

/// Aggregates donations per campaign under the current goal epoch.
///
/// Refreshes for one campaign never overlap: triggers are funnelled through
/// a [`SingleFlight`], and only the owner of the flight writes the cached
/// aggregate. Different campaigns refresh concurrently.
pub struct DonationAggregator {
    donations: Arc<dyn DonationRepositoryTrait>,
    board: Arc<GoalBoard>,
    retry: RetryPolicy,
    flights: SingleFlight,
    cache: Mutex<HashMap<String, AggregateSender>>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl DonationAggregator {
    pub fn new(
        donations: Arc<dyn DonationRepositoryTrait>,
        board: Arc<GoalBoard>,
        retry: RetryPolicy,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            donations,
            board,
            retry,
            flights: SingleFlight::new(),
            cache: Mutex::new(HashMap::new()),
            event_sink,
        }
    }

    fn sender(&self, campaign_id: &str) -> AggregateSender {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(campaign_id.to_string())
            .or_insert_with(|| Arc::new(watch::channel(None).0))
            .clone()
    }

    /// Pulls the full donation snapshot and sums it under `epoch`.
    ///
    /// Pure with respect to the cache: safe to call redundantly.
    pub async fn recompute(&self, campaign_id: &str, epoch: &GoalEpoch) -> Result<AggregateTotal> {
        let label = format!("query donations {}", campaign_id);
        let donations = with_retry(&self.retry, &label, || {
            self.donations.query_donations(campaign_id)
        })
        .await?;
        Ok(aggregate_donations(
            campaign_id,
            &donations,
            epoch.created_at,
            now_millis(),
        ))
    }

    /// Handles a change hint: schedules a refresh in the background.
    ///
    /// Hints arriving while a refresh runs collapse into one trailing refresh.
    pub fn on_feed_event(self: &Arc<Self>, campaign_id: &str) {
        match self.flights.begin(campaign_id) {
            Some(guard) => {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.run_flight(guard).await;
                });
            }
            None => debug!(
                "Refresh for campaign {} already in flight; coalesced",
                campaign_id
            ),
        }
    }

    /// Runs a refresh on the caller's task if none is in flight and returns
    /// the outcome of its last round.
    ///
    /// Returns `None` when one was already running; a trailing round has then
    /// been requested from it.
    pub async fn refresh_now(&self, campaign_id: &str) -> Option<RefreshOutcome> {
        let guard = self.flights.begin(campaign_id)?;
        Some(self.run_flight(guard).await)
    }

    pub fn is_refreshing(&self, campaign_id: &str) -> bool {
        self.flights.is_in_flight(campaign_id)
    }

    async fn run_flight(&self, mut guard: FlightGuard) -> RefreshOutcome {
        let campaign_id = guard.key().to_string();
        loop {
            let outcome = self.refresh_once(&campaign_id).await;
            if !guard.next_round() {
                return outcome;
            }
        }
    }

    async fn refresh_once(&self, campaign_id: &str) -> RefreshOutcome {
        let Some(epoch) = self.board.slot(campaign_id).epoch() else {
            return RefreshOutcome::Skipped;
        };

        match self.recompute(campaign_id, &epoch).await {
            Ok(aggregate) => match self.commit(campaign_id, epoch.token, aggregate) {
                Ok(()) => RefreshOutcome::Committed,
                Err(err) => {
                    debug!("Discarding aggregate: {}", err);
                    self.flights.request_rerun(campaign_id);
                    RefreshOutcome::Discarded
                }
            },
            Err(err) => {
                warn!(
                    "Keeping last known total for campaign {}: {}",
                    campaign_id, err
                );
                self.mark_possibly_stale(campaign_id);
                RefreshOutcome::Failed
            }
        }
    }

    fn commit(&self, campaign_id: &str, token: u64, aggregate: AggregateTotal) -> Result<()> {
        let current = self.board.current_token(campaign_id);
        if current != token {
            return Err(Error::StaleEpoch {
                campaign_id: campaign_id.to_string(),
                computed: token,
                current,
            });
        }

        let total = aggregate.total;
        let entry = CachedAggregate {
            aggregate,
            token,
            possibly_stale: false,
        };
        let changed = self.sender(campaign_id).send_if_modified(|cached| {
            let same = cached.as_ref().is_some_and(|c| {
                !c.possibly_stale
                    && c.aggregate.goal_epoch == entry.aggregate.goal_epoch
                    && c.aggregate.total == entry.aggregate.total
                    && c.aggregate.included_count == entry.aggregate.included_count
            });
            if same {
                return false;
            }
            *cached = Some(entry);
            true
        });

        if changed {
            self.event_sink
                .emit(DomainEvent::aggregate_updated(campaign_id, total));
        }
        Ok(())
    }

    fn mark_possibly_stale(&self, campaign_id: &str) {
        self.sender(campaign_id).send_if_modified(|cached| match cached {
            Some(c) if !c.possibly_stale => {
                c.possibly_stale = true;
                true
            }
            _ => false,
        });
    }

    /// Cached aggregate, only if it belongs to the live goal's epoch.
    pub fn latest(&self, campaign_id: &str) -> Option<CachedAggregate> {
        let epoch_start = self.board.slot(campaign_id).goal?.created_at;
        self.sender(campaign_id)
            .borrow()
            .clone()
            .filter(|c| c.aggregate.goal_epoch == epoch_start)
    }

    /// Change notifications for the campaign's cached aggregate. Receivers
    /// must check the epoch themselves.
    pub fn subscribe(&self, campaign_id: &str) -> watch::Receiver<Option<CachedAggregate>> {
        self.sender(campaign_id).subscribe()
    }
}
