//! Aggregation module - per-campaign donation totals under a goal epoch.

mod aggregate_model;
mod aggregator;
mod single_flight;


pub use aggregate_model::{aggregate_donations, AggregateTotal, CachedAggregate};
pub use aggregator::{DonationAggregator, RefreshOutcome};
pub use single_flight::{FlightGuard, SingleFlight};
