//! Donations module - domain models and store traits.

mod donations_model;
mod donations_traits;

pub use donations_model::{lenient_amount, Donation, RecurringStatus};
pub use donations_traits::{DonationFeedTrait, DonationRepositoryTrait, FeedHandle};
