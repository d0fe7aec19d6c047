//! Bridges stopwatch lifecycle events to the presence service

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::{PresencePayload, PresenceService};
use crate::timer::{TimerEvent, TimerEventType};

/// Stateless: every event carries the binding it needs.
///
/// Events are handled one at a time in emission order, so the clear for a
/// finished run always reaches the service before the set for the next one.
pub struct PresenceSyncAdapter {
    service: Arc<dyn PresenceService>,
}

impl PresenceSyncAdapter {
    pub fn new(service: Arc<dyn PresenceService>) -> Self {
        Self { service }
    }

    pub async fn handle(&self, event: &TimerEvent) {
        let (action, result) = match &event.event_type {
            TimerEventType::Started { binding } => (
                "set",
                self.service
                    .set_presence(&PresencePayload::from_binding(binding, binding.details.clone()))
                    .await,
            ),
            TimerEventType::SyncMemo { binding, memo } => (
                "sync",
                self.service
                    .set_presence(&PresencePayload::from_binding(binding, memo.clone()))
                    .await,
            ),
            TimerEventType::Completed { binding, .. } | TimerEventType::Cancelled { binding } => {
                ("clear", self.service.clear_presence(&binding.group).await)
            }
            TimerEventType::StartEdited { .. } | TimerEventType::Tick { .. } => return,
        };

        match result {
            Ok(()) => tracing::debug!(slot = %event.slot, "Presence {} ok", action),
            Err(e) => tracing::warn!(slot = %event.slot, "Presence {} failed: {}", action, e),
        }
    }

    /// Process events until every sender is gone.
    pub fn spawn(self, mut rx: broadcast::Receiver<TimerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Presence sync lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Presence sync stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_manager::EventManager;
    use crate::testing::{binding, PresenceCall, RecordingPresence};
    use actrack_core::models::TimerSlot;
    use chrono::Utc;

    #[tokio::test]
    async fn test_lifecycle_maps_to_presence_calls() {
        let presence = Arc::new(RecordingPresence::new());
        let adapter = PresenceSyncAdapter::new(presence.clone());
        let mut b = binding(1);
        b.details = "Today 5 min".to_string();

        adapter
            .handle(&TimerEvent::started(TimerSlot::Main, b.clone(), Utc::now()))
            .await;
        adapter
            .handle(&TimerEvent::new(
                TimerEventType::SyncMemo {
                    binding: b.clone(),
                    memo: "page 40".to_string(),
                },
                TimerSlot::Main,
                Utc::now(),
            ))
            .await;
        adapter
            .handle(&TimerEvent::tick(TimerSlot::Main, 1000, Utc::now()))
            .await;
        adapter
            .handle(&TimerEvent::cancelled(TimerSlot::Main, b.clone(), Utc::now()))
            .await;

        let calls = presence.calls();
        assert_eq!(calls.len(), 3);
        match &calls[0] {
            PresenceCall::Set(p) => {
                assert_eq!(p.details, "Today 5 min");
                assert_eq!(p.group, "study");
                assert_eq!(p.asset_key, "default_image");
            }
            other => panic!("Expected set, got {:?}", other),
        }
        assert!(matches!(&calls[1], PresenceCall::Set(p) if p.details == "page 40"));
        assert_eq!(calls[2], PresenceCall::Clear("study".to_string()));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let presence = Arc::new(RecordingPresence::new());
        presence.set_failing(true);
        let adapter = PresenceSyncAdapter::new(presence.clone());

        adapter
            .handle(&TimerEvent::started(TimerSlot::Sub, binding(2), Utc::now()))
            .await;
        assert_eq!(presence.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_adapter_drains_then_stops() {
        let presence = Arc::new(RecordingPresence::new());
        let events = EventManager::new();
        let handle = PresenceSyncAdapter::new(presence.clone()).spawn(events.subscribe());

        events.emit_timer(TimerEvent::started(TimerSlot::Main, binding(1), Utc::now()));
        events.emit_timer(TimerEvent::completed(
            TimerSlot::Main,
            binding(1),
            1.0,
            None,
            Utc::now(),
        ));
        drop(events);

        handle.await.unwrap();
        let calls = presence.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], PresenceCall::Set(_)));
        assert!(matches!(calls[1], PresenceCall::Clear(_)));
    }
}
