//! Stopwatch lifecycle events

use actrack_core::models::{ActivityBinding, TimerSlot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event emitted by a stopwatch engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerEvent {
    pub event_type: TimerEventType,
    pub slot: TimerSlot,
    pub timestamp: DateTime<Utc>,
}

/// Types of timer events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEventType {
    /// A run began against `binding`
    Started { binding: ActivityBinding },
    /// A run ended and produced a duration to record
    Completed {
        binding: ActivityBinding,
        elapsed_minutes: f64,
        memo: Option<String>,
    },
    /// A run was discarded without a record
    Cancelled { binding: ActivityBinding },
    /// The user asked to push the current memo to the presence service
    SyncMemo {
        binding: ActivityBinding,
        memo: String,
    },
    /// The start time of the current run was corrected
    StartEdited { start_reference: DateTime<Utc> },
    /// Periodic display refresh
    Tick { display_ms: i64 },
}

impl TimerEvent {
    pub fn new(event_type: TimerEventType, slot: TimerSlot, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            slot,
            timestamp,
        }
    }

    pub fn started(slot: TimerSlot, binding: ActivityBinding, at: DateTime<Utc>) -> Self {
        Self::new(TimerEventType::Started { binding }, slot, at)
    }

    pub fn completed(
        slot: TimerSlot,
        binding: ActivityBinding,
        elapsed_minutes: f64,
        memo: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            TimerEventType::Completed {
                binding,
                elapsed_minutes,
                memo,
            },
            slot,
            at,
        )
    }

    pub fn cancelled(slot: TimerSlot, binding: ActivityBinding, at: DateTime<Utc>) -> Self {
        Self::new(TimerEventType::Cancelled { binding }, slot, at)
    }

    pub fn tick(slot: TimerSlot, display_ms: i64, at: DateTime<Utc>) -> Self {
        Self::new(TimerEventType::Tick { display_ms }, slot, at)
    }

    pub fn is_tick(&self) -> bool {
        matches!(self.event_type, TimerEventType::Tick { .. })
    }
}
