//! Domain event sink trait and implementations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;

use super::DomainEvent;

/// Receives engine events once the state they describe is committed.
///
/// `emit` runs inline on engine tasks, including campaign workers, so it must
/// not block or touch the stores. Events are best-effort: a host that drops
/// them loses notifications, never progress or badge state.
pub trait DomainEventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);

    /// Emits in order, one by one.
    fn emit_batch(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Discards everything. For hosts that only read progress streams.
#[derive(Clone, Default)]
pub struct NoOpDomainEventSink;

impl DomainEventSink for NoOpDomainEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// Sink that writes every event to the log at info level.
#[derive(Clone, Default)]
pub struct LogDomainEventSink;

impl DomainEventSink for LogDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        info!("domain event: {:?}", event);
    }
}

/// Records emitted events so tests can assert on what the engine announced.
#[derive(Clone, Default)]
pub struct MockDomainEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MockDomainEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<DomainEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every event emitted so far, in emission order.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.guard().clone()
    }

    /// Emitted events accepted by `keep`, in emission order.
    pub fn events_matching<F>(&self, keep: F) -> Vec<DomainEvent>
    where
        F: Fn(&DomainEvent) -> bool,
    {
        self.guard().iter().filter(|e| keep(e)).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl DomainEventSink for MockDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        self.guard().push(event);
    }
}
