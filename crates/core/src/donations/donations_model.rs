//! Donations domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::time_utils::{lenient_timestamp, truncate_to_millis};

/// Lifecycle of a recurring donation. Informational only; it never changes
/// how a donation is aggregated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurringStatus {
    Active,
    Cancelled,
}

/// Domain model representing a donation.
///
/// Donations are immutable once created. Records read from a document store
/// may be incomplete, so the fields the engine depends on are optional and
/// validated at use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, with = "lenient_amount")]
    pub amount: Option<Decimal>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub status: Option<RecurringStatus>,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub wants_receipt: bool,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl Donation {
    /// Creates a one-off donation with the fields the engine reads.
    pub fn new(
        id: impl Into<String>,
        campaign_id: impl Into<String>,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            campaign_id: Some(campaign_id.into()),
            user_id: None,
            amount: Some(amount),
            created_at: Some(truncate_to_millis(created_at)),
            is_recurring: false,
            status: None,
            payer_email: None,
            wants_receipt: false,
            is_anonymous: false,
        }
    }

    /// Sets the donor.
    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Marks the donation as recurring and active.
    pub fn recurring(mut self) -> Self {
        self.is_recurring = true;
        self.status = Some(RecurringStatus::Active);
        self
    }

    /// Amount usable for sums: present and non-negative.
    pub fn valid_amount(&self) -> Option<Decimal> {
        self.amount.filter(|amount| !amount.is_sign_negative())
    }

    /// Campaign id, if present and non-blank.
    pub fn campaign(&self) -> Option<&str> {
        self.campaign_id
            .as_deref()
            .filter(|campaign| !campaign.trim().is_empty())
    }

    /// True when both amount and campaign id are usable.
    pub fn is_well_formed(&self) -> bool {
        self.valid_amount().is_some() && self.campaign().is_some()
    }

    /// Timestamp used for epoch filtering; a missing one counts as `now`.
    pub fn effective_created_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.created_at.unwrap_or(now)
    }

    /// True for recurring donations that have not been cancelled.
    pub fn is_active_recurring(&self) -> bool {
        self.is_recurring && self.status != Some(RecurringStatus::Cancelled)
    }
}

/// Serde adapter for amounts stored as numbers or numeric strings.
///
/// Unparseable values decode to `None` so one bad document does not fail a
/// whole snapshot. Amounts are always written back as strings.
pub mod lenient_amount {
    use super::*;
    use crate::utils::decimal_serde::{decimal_from_value, decimal_serde_option};
    use serde::{Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        decimal_serde_option::serialize(value, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(decimal_from_value(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decode_well_formed_document() {
        let donation: Donation = serde_json::from_value(json!({
            "id": "d1",
            "campaignId": "camp-1",
            "userId": "user-1",
            "amount": 30.1,
            "createdAt": {"seconds": 1_700_000_000, "nanoseconds": 0},
            "isRecurring": true,
            "status": "active",
            "payerEmail": "donor@example.org",
            "wantsReceipt": true
        }))
        .unwrap();

        assert_eq!(donation.valid_amount(), Some(dec!(30.1)));
        assert_eq!(donation.campaign(), Some("camp-1"));
        assert_eq!(
            donation.created_at,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
        assert!(donation.is_active_recurring());
        assert!(donation.wants_receipt);
        assert!(!donation.is_anonymous);
    }

    #[test]
    fn test_decode_malformed_document_does_not_fail() {
        let donation: Donation = serde_json::from_value(json!({
            "id": "d2",
            "amount": "twelve",
            "createdAt": "not a date"
        }))
        .unwrap();

        assert_eq!(donation.amount, None);
        assert_eq!(donation.created_at, None);
        assert!(!donation.is_well_formed());
    }

    #[test]
    fn test_amount_from_string() {
        let donation: Donation =
            serde_json::from_value(json!({"id": "d3", "campaignId": "c", "amount": " 12.50 "}))
                .unwrap();
        assert_eq!(donation.valid_amount(), Some(dec!(12.50)));
        assert!(donation.is_well_formed());
    }

    #[test]
    fn test_amount_is_written_as_exact_string() {
        let donation = Donation::new("d8", "c", dec!(9007199254740993.01), Utc::now());
        let json = serde_json::to_value(&donation).unwrap();
        assert_eq!(json["amount"], json!("9007199254740993.01"));

        let back: Donation = serde_json::from_value(json).unwrap();
        assert_eq!(back.amount, Some(dec!(9007199254740993.01)));
    }

    #[test]
    fn test_negative_amount_is_not_valid() {
        let donation = Donation::new("d4", "c", dec!(-5), Utc::now());
        assert_eq!(donation.valid_amount(), None);
        assert!(!donation.is_well_formed());
    }

    #[test]
    fn test_blank_campaign_is_not_well_formed() {
        let mut donation = Donation::new("d5", "  ", dec!(5), Utc::now());
        assert!(!donation.is_well_formed());
        donation.campaign_id = None;
        assert_eq!(donation.campaign(), None);
    }

    #[test]
    fn test_missing_timestamp_counts_as_now() {
        let mut donation = Donation::new("d6", "c", dec!(1), Utc::now());
        donation.created_at = None;
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(donation.effective_created_at(now), now);
    }

    #[test]
    fn test_cancelled_recurring_is_not_active() {
        let mut donation = Donation::new("d7", "c", dec!(10), Utc::now()).recurring();
        assert!(donation.is_active_recurring());
        donation.status = Some(RecurringStatus::Cancelled);
        assert!(!donation.is_active_recurring());
        assert!(donation.is_recurring);
    }
}
