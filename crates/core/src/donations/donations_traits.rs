use std::fmt;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::donations::donations_model::Donation;
use crate::errors::Result;

/// Trait for donation snapshot reads.
#[async_trait]
pub trait DonationRepositoryTrait: Send + Sync {
    /// Full current snapshot of a campaign's donations.
    async fn query_donations(&self, campaign_id: &str) -> Result<Vec<Donation>>;

    /// Full donation history of a user across campaigns.
    async fn query_user_donations(&self, user_id: &str) -> Result<Vec<Donation>>;
}

/// Trait for change notifications on a campaign's donations.
///
/// Delivery is at-least-once and unordered. A notification carries no
/// payload the engine trusts; it only means "re-query".
pub trait DonationFeedTrait: Send + Sync {
    fn subscribe_donations(&self, campaign_id: &str) -> Result<FeedHandle>;
}

/// Live feed subscription. Dropping the handle unregisters it.
pub struct FeedHandle {
    campaign_id: String,
    hints: BoxStream<'static, ()>,
}

impl FeedHandle {
    pub fn new<S>(campaign_id: impl Into<String>, hints: S) -> Self
    where
        S: futures::Stream<Item = ()> + Send + 'static,
    {
        Self {
            campaign_id: campaign_id.into(),
            hints: hints.boxed(),
        }
    }

    /// Wraps a broadcast receiver. A lagged receiver missed notifications,
    /// which still means "something changed", so lag is reported as a hint.
    pub fn from_broadcast<T>(campaign_id: impl Into<String>, receiver: broadcast::Receiver<T>) -> Self
    where
        T: Clone + Send + 'static,
    {
        Self::new(campaign_id, BroadcastStream::new(receiver).map(|_| ()))
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    /// Waits for the next change hint; `None` once the feed has closed.
    pub async fn next_hint(&mut self) -> Option<()> {
        self.hints.next().await
    }
}

impl fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("campaign_id", &self.campaign_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_feed_yields_hints_and_closes() {
        let (tx, rx) = broadcast::channel::<u64>(4);
        let mut handle = FeedHandle::from_broadcast("camp-1", rx);
        assert_eq!(handle.campaign_id(), "camp-1");

        tx.send(1).unwrap();
        assert_eq!(handle.next_hint().await, Some(()));

        drop(tx);
        assert_eq!(handle.next_hint().await, None);
    }

    #[tokio::test]
    async fn test_lagged_feed_still_reports_change() {
        let (tx, rx) = broadcast::channel::<u64>(1);
        let mut handle = FeedHandle::from_broadcast("camp-1", rx);
        for i in 0..5 {
            tx.send(i).unwrap();
        }
        // First item is the lag notice, then the retained message.
        assert_eq!(handle.next_hint().await, Some(()));
        assert_eq!(handle.next_hint().await, Some(()));
    }
}
