//! Badge catalog and per-user badge state.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::constants::*;
use crate::utils::decimal_serde::{decimal_serde, decimal_serde_option};

/// How a badge gets unlocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeKind {
    /// At least one donation.
    FirstDonation,
    /// Sum of all donations reaches `target`.
    CumulativeAmount {
        #[serde(with = "decimal_serde")]
        target: Decimal,
    },
    /// Number of donations to a single campaign reaches `target`.
    Loyalty { target: u32 },
    /// At least one recurring donation.
    RecurringSupporter,
    /// Signalled from outside when a supported campaign reaches its goal.
    CampaignCompletion,
    /// Display-only entry; never unlocked by evaluation.
    Informational,
}

impl BadgeKind {
    /// True when the unlock state is a function of donation history.
    pub fn is_derived(&self) -> bool {
        !matches!(self, BadgeKind::CampaignCompletion | BadgeKind::Informational)
    }

    /// Numeric target for progress display.
    pub fn target(&self) -> Option<Decimal> {
        match self {
            BadgeKind::CumulativeAmount { target } => Some(*target),
            BadgeKind::Loyalty { target } => Some(Decimal::from(*target)),
            _ => None,
        }
    }
}

/// Static catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDefinition {
    pub id: String,
    pub title: String,
    pub kind: BadgeKind,
}

impl BadgeDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: BadgeKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
        }
    }
}

/// The catalog shipped with the app, with targets taken from config.
pub fn default_catalog(config: &EngineConfig) -> Vec<BadgeDefinition> {
    vec![
        BadgeDefinition::new(
            BADGE_FIRST_DONATION,
            "First donation",
            BadgeKind::FirstDonation,
        ),
        BadgeDefinition::new(
            BADGE_GENEROUS_DONOR,
            "Generous donor",
            BadgeKind::CumulativeAmount {
                target: config.cumulative_badge_target,
            },
        ),
        BadgeDefinition::new(
            BADGE_LOYAL_SUPPORTER,
            "Loyal supporter",
            BadgeKind::Loyalty {
                target: config.loyalty_badge_target,
            },
        ),
        BadgeDefinition::new(
            BADGE_RECURRING_SUPPORTER,
            "Recurring supporter",
            BadgeKind::RecurringSupporter,
        ),
        BadgeDefinition::new(
            BADGE_CAMPAIGN_CHAMPION,
            "Campaign champion",
            BadgeKind::CampaignCompletion,
        ),
    ]
}

/// Unlock state of one badge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeStatus {
    pub unlocked: bool,
    /// Percentage toward the target, for badges that have one.
    #[serde(default, with = "decimal_serde_option")]
    pub progress: Option<Decimal>,
}

/// Badge id to unlock state, for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeState {
    pub badges: BTreeMap<String, BadgeStatus>,
}

impl BadgeState {
    /// Every catalog badge present and locked.
    pub fn all_locked(catalog: &[BadgeDefinition]) -> Self {
        Self {
            badges: catalog
                .iter()
                .map(|def| (def.id.clone(), BadgeStatus::default()))
                .collect(),
        }
    }

    pub fn is_unlocked(&self, badge_id: &str) -> bool {
        self.badges.get(badge_id).is_some_and(|s| s.unlocked)
    }

    pub fn status(&self, badge_id: &str) -> Option<&BadgeStatus> {
        self.badges.get(badge_id)
    }

    /// Unlocks a badge. Returns true if it was locked before.
    pub fn unlock(&mut self, badge_id: &str) -> bool {
        let status = self.badges.entry(badge_id.to_string()).or_default();
        let changed = !status.unlocked;
        status.unlocked = true;
        changed
    }

    pub fn unlocked_ids(&self) -> Vec<String> {
        self.badges
            .iter()
            .filter(|(_, s)| s.unlocked)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Union of two states: a badge is unlocked if either side has it
    /// unlocked, and progress is the larger of the two. Never re-locks.
    pub fn merge(&self, other: &BadgeState) -> BadgeState {
        let mut merged = self.clone();
        for (id, theirs) in &other.badges {
            let ours = merged.badges.entry(id.clone()).or_default();
            ours.unlocked |= theirs.unlocked;
            ours.progress = match (ours.progress, theirs.progress) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }
        merged
    }

    /// True if every badge unlocked in `other` is unlocked here too.
    pub fn covers(&self, other: &BadgeState) -> bool {
        other
            .badges
            .iter()
            .filter(|(_, s)| s.unlocked)
            .all(|(id, _)| self.is_unlocked(id))
    }

    /// Badges unlocked here but not in `previous`.
    pub fn newly_unlocked(&self, previous: &BadgeState) -> Vec<String> {
        self.badges
            .iter()
            .filter(|(id, s)| s.unlocked && !previous.is_unlocked(id))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state(entries: &[(&str, bool, Option<Decimal>)]) -> BadgeState {
        BadgeState {
            badges: entries
                .iter()
                .map(|(id, unlocked, progress)| {
                    (
                        id.to_string(),
                        BadgeStatus {
                            unlocked: *unlocked,
                            progress: *progress,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_default_catalog_uses_config_targets() {
        let config = EngineConfig {
            cumulative_badge_target: dec!(250),
            loyalty_badge_target: 4,
            ..EngineConfig::default()
        };
        let catalog = default_catalog(&config);
        assert_eq!(catalog.len(), 5);
        let generous = catalog.iter().find(|d| d.id == BADGE_GENEROUS_DONOR).unwrap();
        assert_eq!(generous.kind.target(), Some(dec!(250)));
        let loyal = catalog.iter().find(|d| d.id == BADGE_LOYAL_SUPPORTER).unwrap();
        assert_eq!(loyal.kind.target(), Some(dec!(4)));
        let champion = catalog.iter().find(|d| d.id == BADGE_CAMPAIGN_CHAMPION).unwrap();
        assert!(!champion.kind.is_derived());
    }

    #[test]
    fn test_all_locked() {
        let catalog = default_catalog(&EngineConfig::default());
        let state = BadgeState::all_locked(&catalog);
        assert_eq!(state.badges.len(), catalog.len());
        assert!(state.unlocked_ids().is_empty());
    }

    #[test]
    fn test_merge_never_relocks() {
        let a = state(&[("a", true, Some(dec!(100))), ("b", false, Some(dec!(40)))]);
        let b = state(&[("a", false, Some(dec!(10))), ("b", false, Some(dec!(60))), ("c", true, None)]);
        let merged = a.merge(&b);
        assert!(merged.is_unlocked("a"));
        assert!(!merged.is_unlocked("b"));
        assert!(merged.is_unlocked("c"));
        assert_eq!(merged.status("a").unwrap().progress, Some(dec!(100)));
        assert_eq!(merged.status("b").unwrap().progress, Some(dec!(60)));
        assert_eq!(merged, b.merge(&a));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = state(&[("a", true, None), ("b", false, Some(dec!(5)))]);
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn test_unlock_and_newly_unlocked() {
        let previous = state(&[("a", true, None), ("b", false, None)]);
        let mut next = previous.clone();
        assert!(next.unlock("b"));
        assert!(!next.unlock("b"));
        assert!(next.unlock("c"));
        assert_eq!(next.newly_unlocked(&previous), vec!["b".to_string(), "c".to_string()]);
        assert!(next.covers(&previous));
        assert!(!previous.covers(&next));
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let s = state(&[("first-donation", true, None), ("generous-donor", false, Some(dec!(42.5)))]);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains(r#""progress":"42.5""#));
        let back: BadgeState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
