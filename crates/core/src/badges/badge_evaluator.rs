use std::collections::HashMap;

use log::debug;
use rust_decimal::Decimal;

use super::badges_model::{BadgeDefinition, BadgeKind, BadgeState, BadgeStatus};
use crate::config::EngineConfig;
use crate::donations::Donation;
use crate::progress::progress_percentage;

/// Decimal places kept for badge progress, which is display-only.
const BADGE_PROGRESS_DP: u32 = 2;

#[derive(Debug, Default)]
struct HistoryStats {
    count: usize,
    total: Decimal,
    largest_campaign_group: usize,
    has_recurring: bool,
}

fn summarize(history: &[Donation]) -> HistoryStats {
    let mut stats = HistoryStats::default();
    let mut per_campaign: HashMap<&str, usize> = HashMap::new();
    let mut skipped = 0usize;

    for donation in history {
        let (Some(amount), Some(campaign)) = (donation.valid_amount(), donation.campaign()) else {
            skipped += 1;
            continue;
        };
        stats.count += 1;
        stats.total = stats.total.checked_add(amount).unwrap_or(Decimal::MAX);
        stats.has_recurring |= donation.is_recurring;
        *per_campaign.entry(campaign).or_insert(0) += 1;
    }

    stats.largest_campaign_group = per_campaign.values().copied().max().unwrap_or(0);
    if skipped > 0 {
        debug!("Badge evaluation skipped {} malformed donation(s)", skipped);
    }
    stats
}

/// Derives badge unlock state from a user's full donation history.
///
/// Deterministic and stateless: the same history always gives the same
/// state. Badges that are not derived from history come out locked and are
/// carried over by merging with persisted state.
#[derive(Debug, Clone)]
pub struct BadgeEvaluator {
    catalog: Vec<BadgeDefinition>,
}

impl BadgeEvaluator {
    pub fn new(catalog: Vec<BadgeDefinition>) -> Self {
        Self { catalog }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(super::badges_model::default_catalog(config))
    }

    pub fn catalog(&self) -> &[BadgeDefinition] {
        &self.catalog
    }

    pub fn evaluate(&self, history: &[Donation]) -> BadgeState {
        let stats = summarize(history);
        let mut state = BadgeState::default();

        for def in &self.catalog {
            let status = match &def.kind {
                BadgeKind::FirstDonation => BadgeStatus {
                    unlocked: stats.count > 0,
                    progress: None,
                },
                BadgeKind::CumulativeAmount { target } => BadgeStatus {
                    unlocked: stats.total >= *target,
                    progress: Some(display_progress(stats.total, *target)),
                },
                BadgeKind::Loyalty { target } => {
                    let group = Decimal::from(stats.largest_campaign_group as u64);
                    let target = Decimal::from(*target);
                    BadgeStatus {
                        unlocked: group >= target,
                        progress: Some(display_progress(group, target)),
                    }
                }
                BadgeKind::RecurringSupporter => BadgeStatus {
                    unlocked: stats.has_recurring,
                    progress: None,
                },
                BadgeKind::CampaignCompletion | BadgeKind::Informational => BadgeStatus::default(),
            };
            state.badges.insert(def.id.clone(), status);
        }
        state
    }
}

fn display_progress(value: Decimal, target: Decimal) -> Decimal {
    progress_percentage(value, target).round_dp(BADGE_PROGRESS_DP)
}
