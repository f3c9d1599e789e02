//! Goals domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};
use crate::utils::decimal_serde::decimal_serde;

/// Domain model representing the live goal of a campaign.
///
/// `created_at` is the epoch cutover: donations made before it never count
/// toward this goal. It is set once when the goal is created and survives
/// every later edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub campaign_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "decimal_serde")]
    pub target_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Goal {
    /// True once the optional end date has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| now > end)
    }

    /// Whole days left until the end date, floored at zero.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.end_date
            .map(|end| (end - now).num_days().max(0))
    }

    /// Applies editable fields in place. The epoch is left untouched.
    pub(crate) fn apply(&mut self, fields: GoalFields, now: DateTime<Utc>) {
        self.title = fields.title.trim().to_string();
        self.description = fields.description;
        self.target_amount = fields.target_amount;
        self.end_date = fields.end_date;
        self.updated_at = now;
    }
}

/// Editable goal fields submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalFields {
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "decimal_serde")]
    pub target_amount: Decimal,
    pub end_date: Option<DateTime<Utc>>,
}

impl GoalFields {
    pub fn new(title: impl Into<String>, target_amount: Decimal) -> Self {
        Self {
            title: title.into(),
            description: None,
            target_amount,
            end_date: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Rejects non-positive targets and blank titles.
    pub fn validate(&self) -> Result<()> {
        if self.target_amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.target_amount).into());
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()).into());
        }
        Ok(())
    }
}

/// The epoch a computation runs under.
///
/// `created_at` decides which donations count. `token` is bumped on every
/// goal mutation and tells a finished computation whether it is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalEpoch {
    pub created_at: DateTime<Utc>,
    pub token: u64,
}

/// Latest known goal state for a campaign, as published by the goal board.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalSlot {
    /// Monotonic mutation counter.
    pub token: u64,
    /// Live goal, `None` when the campaign has no goal.
    pub goal: Option<Goal>,
    /// False until the goal has been read or written at least once.
    pub loaded: bool,
    /// Highest epoch ever seen for the campaign.
    pub highest_epoch: Option<DateTime<Utc>>,
}

impl GoalSlot {
    /// Epoch to aggregate under, if a goal is live.
    pub fn epoch(&self) -> Option<GoalEpoch> {
        self.goal.as_ref().map(|goal| GoalEpoch {
            created_at: goal.created_at,
            token: self.token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn goal() -> Goal {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Goal {
            id: "g1".into(),
            campaign_id: "camp-1".into(),
            title: "Clean water".into(),
            description: None,
            target_amount: dec!(100),
            created_at: t0,
            updated_at: t0,
            end_date: Some(t0 + Duration::days(10)),
        }
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        assert!(GoalFields::new("Water", dec!(0)).validate().is_err());
        assert!(GoalFields::new("Water", dec!(-1)).validate().is_err());
        assert!(GoalFields::new("   ", dec!(10)).validate().is_err());
        assert!(GoalFields::new("Water", dec!(0.01)).validate().is_ok());
    }

    #[test]
    fn test_apply_preserves_epoch() {
        let mut g = goal();
        let created = g.created_at;
        let later = created + Duration::hours(3);
        g.apply(GoalFields::new("  Wells  ", dec!(250)), later);
        assert_eq!(g.title, "Wells");
        assert_eq!(g.target_amount, dec!(250));
        assert_eq!(g.created_at, created);
        assert_eq!(g.updated_at, later);
        assert_eq!(g.end_date, None);
    }

    #[test]
    fn test_end_date_helpers() {
        let g = goal();
        let now = g.created_at + Duration::days(3);
        assert!(!g.is_expired(now));
        assert_eq!(g.days_remaining(now), Some(7));

        let after = g.created_at + Duration::days(12);
        assert!(g.is_expired(after));
        assert_eq!(g.days_remaining(after), Some(0));
    }

    #[test]
    fn test_slot_epoch() {
        let mut slot = GoalSlot::default();
        assert_eq!(slot.epoch(), None);
        slot.goal = Some(goal());
        slot.token = 4;
        let epoch = slot.epoch().unwrap();
        assert_eq!(epoch.token, 4);
        assert_eq!(epoch.created_at, goal().created_at);
    }

    #[test]
    fn test_goal_serializes_camel_case() {
        let json = serde_json::to_value(goal()).unwrap();
        assert_eq!(json["targetAmount"], serde_json::json!(goal().target_amount.to_string()));
        assert!(json.get("createdAt").is_some());
        assert!(json.get("campaignId").is_some());
    }
}
