/// Default per-call deadline for document store operations
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Default number of attempts for a store call before giving up
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the second attempt; doubled on each further attempt
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;

/// Upper bound for a single backoff sleep
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2_000;

/// Delay of the forced re-poll after a campaign goal is loaded, to cover feed latency
pub const DEFAULT_FORCED_REFRESH_DELAY_MS: u64 = 1_500;

/// Period of the background forced refresh while a campaign is open
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;

/// Cumulative amount (currency units) unlocking the generous donor badge
pub const DEFAULT_CUMULATIVE_BADGE_TARGET: i64 = 100;

/// Donations to a single campaign unlocking the loyal supporter badge
pub const DEFAULT_LOYALTY_BADGE_TARGET: u32 = 10;

/// Badge identifiers of the default catalog
pub const BADGE_FIRST_DONATION: &str = "first-donation";
pub const BADGE_GENEROUS_DONOR: &str = "generous-donor";
pub const BADGE_LOYAL_SUPPORTER: &str = "loyal-supporter";
pub const BADGE_RECURRING_SUPPORTER: &str = "recurring-supporter";
pub const BADGE_CAMPAIGN_CHAMPION: &str = "campaign-champion";
