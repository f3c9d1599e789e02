//! In-process document store.
//!
//! Keeps every record as a JSON document, the way a hosted document database
//! would, and decodes on read. Used by hosts without a backend and by tests,
//! which can take it offline or make reads slow or failing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::badges::{BadgeState, BadgeStateRepositoryTrait};
use crate::donations::{Donation, DonationFeedTrait, DonationRepositoryTrait, FeedHandle};
use crate::errors::{Error, Result, StoreError};
use crate::goals::{Goal, GoalRepositoryTrait};

const FEED_CAPACITY: usize = 16;

#[derive(Default)]
struct Documents {
    donations: Vec<Value>,
    goals: HashMap<String, Value>,
    badge_states: HashMap<String, Value>,
    feeds: HashMap<String, broadcast::Sender<()>>,
}

/// Document store held in memory.
///
/// Cloning shares the underlying documents, so two clones behave as two
/// connections to the same database.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<Mutex<Documents>>,
    faults: Arc<Faults>,
}

#[derive(Default)]
struct Faults {
    offline: AtomicBool,
    failing_reads: AtomicU32,
    failing_writes: AtomicU32,
    read_delay_ms: AtomicU32,
    reads: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> MutexGuard<'_, Documents> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every call fail with `StoreError::Unavailable` until reset.
    pub fn set_offline(&self, offline: bool) {
        self.faults.offline.store(offline, Ordering::SeqCst);
    }

    /// Fails the next `n` reads with `StoreError::Unavailable`.
    pub fn fail_next_reads(&self, n: u32) {
        self.faults.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Fails the next `n` writes with `StoreError::Unavailable`.
    pub fn fail_next_writes(&self, n: u32) {
        self.faults.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Delays every read by `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        self.faults.read_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of reads served or attempted so far.
    pub fn read_count(&self) -> usize {
        self.faults.reads.load(Ordering::SeqCst)
    }

    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn before_read(&self, what: &str) -> Result<()> {
        self.faults.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.faults.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;
        }
        if self.faults.offline.load(Ordering::SeqCst) || Self::take_fault(&self.faults.failing_reads) {
            return Err(StoreError::Unavailable(format!("read {}", what)).into());
        }
        Ok(())
    }

    fn before_write(&self, what: &str) -> Result<()> {
        if self.faults.offline.load(Ordering::SeqCst) || Self::take_fault(&self.faults.failing_writes) {
            return Err(StoreError::Unavailable(format!("write {}", what)).into());
        }
        Ok(())
    }

    fn feed(documents: &mut Documents, campaign_id: &str) -> broadcast::Sender<()> {
        documents
            .feeds
            .entry(campaign_id.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    /// Appends a donation and notifies the campaign's feed.
    pub fn add_donation(&self, donation: &Donation) -> Result<()> {
        let document = serde_json::to_value(donation)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.add_donation_document(document);
        Ok(())
    }

    /// Appends a raw donation document, which may be malformed.
    pub fn add_donation_document(&self, document: Value) {
        let campaign_id = document
            .get("campaignId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut documents = self.documents();
        documents.donations.push(document);
        if let Some(campaign_id) = campaign_id {
            let feed = Self::feed(&mut documents, &campaign_id);
            // No receivers is fine: nobody is watching the campaign.
            let _ = feed.send(());
        }
    }

    /// Sends a change hint without changing any document.
    pub fn notify(&self, campaign_id: &str) {
        let feed = Self::feed(&mut self.documents(), campaign_id);
        let _ = feed.send(());
    }

    /// Number of live feed subscriptions for the campaign.
    pub fn subscriber_count(&self, campaign_id: &str) -> usize {
        self.documents()
            .feeds
            .get(campaign_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn decode_donations<F>(&self, keep: F) -> Vec<Donation>
    where
        F: Fn(&Donation) -> bool,
    {
        let documents = self.documents().donations.clone();
        documents
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<Donation>(doc) {
                Ok(donation) => Some(donation),
                Err(e) => {
                    debug!("Skipping undecodable donation document: {}", e);
                    None
                }
            })
            .filter(|d| keep(d))
            .collect()
    }
}

fn decode<T: serde::de::DeserializeOwned>(document: Value) -> Result<T> {
    serde_json::from_value(document).map_err(|e| Error::Store(StoreError::Serialization(e.to_string())))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Store(StoreError::Serialization(e.to_string())))
}

#[async_trait]
impl DonationRepositoryTrait for InMemoryDocumentStore {
    async fn query_donations(&self, campaign_id: &str) -> Result<Vec<Donation>> {
        self.before_read(&format!("donations of {}", campaign_id)).await?;
        Ok(self.decode_donations(|d| d.campaign_id.as_deref() == Some(campaign_id)))
    }

    async fn query_user_donations(&self, user_id: &str) -> Result<Vec<Donation>> {
        self.before_read(&format!("donations by {}", user_id)).await?;
        Ok(self.decode_donations(|d| d.user_id.as_deref() == Some(user_id)))
    }
}

impl DonationFeedTrait for InMemoryDocumentStore {
    fn subscribe_donations(&self, campaign_id: &str) -> Result<FeedHandle> {
        if self.faults.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("subscribe {}", campaign_id)).into());
        }
        let receiver = Self::feed(&mut self.documents(), campaign_id).subscribe();
        Ok(FeedHandle::from_broadcast(campaign_id, receiver))
    }
}

#[async_trait]
impl GoalRepositoryTrait for InMemoryDocumentStore {
    async fn get_goal(&self, campaign_id: &str) -> Result<Option<Goal>> {
        self.before_read(&format!("goal of {}", campaign_id)).await?;
        let document = self.documents().goals.get(campaign_id).cloned();
        document.map(decode::<Goal>).transpose()
    }

    async fn put_goal(&self, goal: Goal) -> Result<Goal> {
        self.before_write(&format!("goal of {}", goal.campaign_id))?;
        let document = encode(&goal)?;
        self.documents().goals.insert(goal.campaign_id.clone(), document);
        Ok(goal)
    }

    async fn delete_goal(&self, campaign_id: &str) -> Result<bool> {
        self.before_write(&format!("goal of {}", campaign_id))?;
        Ok(self.documents().goals.remove(campaign_id).is_some())
    }
}

#[async_trait]
impl BadgeStateRepositoryTrait for InMemoryDocumentStore {
    async fn get_badge_state(&self, user_id: &str) -> Result<Option<BadgeState>> {
        self.before_read(&format!("badges of {}", user_id)).await?;
        let document = self.documents().badge_states.get(user_id).cloned();
        document.map(decode::<BadgeState>).transpose()
    }

    async fn put_badge_state(&self, user_id: &str, state: &BadgeState) -> Result<()> {
        self.before_write(&format!("badges of {}", user_id))?;
        let document = encode(state)?;
        self.documents().badge_states.insert(user_id.to_string(), document);
        Ok(())
    }
}
