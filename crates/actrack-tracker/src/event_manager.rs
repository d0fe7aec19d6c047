//! Central event broadcasting

use tokio::sync::broadcast;

use crate::timer::TimerEvent;

const DEFAULT_CAPACITY: usize = 1000;

/// Fans stopwatch events out to every subscriber (presence sync, `watch`, tests)
pub struct EventManager {
    event_tx: broadcast::Sender<TimerEvent>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_tx.subscribe()
    }

    /// Emit a timer event. Having no subscribers is not an error.
    pub fn emit_timer(&self, event: TimerEvent) {
        if event.is_tick() {
            tracing::trace!(slot = %event.slot, "tick");
        } else {
            tracing::debug!(slot = %event.slot, "timer event: {:?}", event.event_type);
        }
        let _ = self.event_tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}
