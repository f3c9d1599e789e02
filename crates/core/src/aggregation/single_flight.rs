//! Per-key single-flight scheduling.
//!
//! At most one run per key is in progress. Triggers arriving during a run
//! collapse into one trailing run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct FlightState {
    rerun_requested: bool,
}

type FlightMap = HashMap<String, FlightState>;

/// Registry of in-progress runs keyed by campaign id.
#[derive(Clone, Default)]
pub struct SingleFlight {
    flights: Arc<Mutex<FlightMap>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FlightMap> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a run for `key`. Returns the guard that owns the run, or
    /// `None` if a run is already in progress, in which case one trailing
    /// run is requested from the owner instead.
    pub fn begin(&self, key: &str) -> Option<FlightGuard> {
        let mut flights = self.lock();
        match flights.get_mut(key) {
            Some(state) => {
                state.rerun_requested = true;
                None
            }
            None => {
                flights.insert(key.to_string(), FlightState::default());
                Some(FlightGuard {
                    flights: self.clone(),
                    key: key.to_string(),
                    finished: false,
                })
            }
        }
    }

    /// Asks the owner of an in-progress run to go around once more.
    /// Returns false when no run is in progress.
    pub fn request_rerun(&self, key: &str) -> bool {
        match self.lock().get_mut(key) {
            Some(state) => {
                state.rerun_requested = true;
                true
            }
            None => false,
        }
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }
}

/// Ownership of one key's run. Dropping it releases the key.
pub struct FlightGuard {
    flights: SingleFlight,
    key: String,
    finished: bool,
}

impl FlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Called after each round. Returns true if another round was requested
    /// meanwhile (and clears the request); otherwise releases the key and
    /// returns false.
    pub fn next_round(&mut self) -> bool {
        let mut flights = self.flights.lock();
        match flights.get_mut(&self.key) {
            Some(state) if state.rerun_requested => {
                state.rerun_requested = false;
                true
            }
            _ => {
                flights.remove(&self.key);
                self.finished = true;
                false
            }
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.flights.lock().remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_coalesces() {
        let flights = SingleFlight::new();
        let mut guard = flights.begin("camp-1").expect("first begin owns the run");
        assert!(flights.begin("camp-1").is_none());
        assert!(flights.begin("camp-1").is_none());
        assert!(flights.is_in_flight("camp-1"));

        // Many triggers, exactly one trailing round.
        assert!(guard.next_round());
        assert!(!guard.next_round());
        assert!(!flights.is_in_flight("camp-1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let flights = SingleFlight::new();
        let _a = flights.begin("camp-1").unwrap();
        let b = flights.begin("camp-2");
        assert!(b.is_some());
        assert_eq!(b.unwrap().key(), "camp-2");
    }

    #[test]
    fn test_dropping_guard_releases_key() {
        let flights = SingleFlight::new();
        {
            let _guard = flights.begin("camp-1").unwrap();
            assert!(flights.is_in_flight("camp-1"));
        }
        assert!(!flights.is_in_flight("camp-1"));
        assert!(flights.begin("camp-1").is_some());
    }

    #[test]
    fn test_request_rerun_without_flight_is_noop() {
        let flights = SingleFlight::new();
        assert!(!flights.request_rerun("camp-1"));
        let mut guard = flights.begin("camp-1").unwrap();
        assert!(flights.request_rerun("camp-1"));
        assert!(guard.next_round());
        assert!(!guard.next_round());
    }
}
