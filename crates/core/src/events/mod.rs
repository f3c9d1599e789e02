//! Domain events module.
//!
//! Provides domain event types and the sink trait for emitting events after
//! goals, aggregates or badge states change. Host adapters implement the sink
//! to translate events into platform-specific actions.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
