//! Dual timer coordinator - routes activity selections to the main and sub stopwatches

use actrack_core::models::{
    Activity, ActivityBinding, NewRecord, PresenceConfig, Record, TimerConfig, TimerSlot,
};
use actrack_core::storage::KeyValueStore;
use actrack_core::Clock;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

use super::engine::{CompletedRun, EngineConfig, StopwatchEngine, TimerEngineError};
use crate::event_manager::EventManager;
use crate::presence::PresenceService;
use crate::record::{PendingRecords, RecordSink, RecordSinkError};

/// Binding of the last activity selected for the main slot, used for auto-start
const LAST_MAIN_KEY: &str = "last_main_binding";

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Timer engine error: {0}")]
    Engine(#[from] TimerEngineError),

    #[error("Activity {0} is counted, not timed")]
    NotTimed(i64),

    #[error("Activity {0} is timed, not counted")]
    NotCount(i64),

    #[error("Another session is already broadcasting presence")]
    PresenceBusy,

    #[error("Record not saved (queued: {queued}): {source}")]
    RecordSink {
        record: NewRecord,
        queued: bool,
        #[source]
        source: RecordSinkError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] actrack_core::Error),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub tick_interval: Duration,
    /// Restart the main stopwatch for the last selected activity on launch
    pub auto_start_main: bool,
    /// Refuse to start main while a foreign presence is active
    pub guard_foreign_session: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            auto_start_main: false,
            guard_foreign_session: false,
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(timer: &TimerConfig, presence: &PresenceConfig) -> Self {
        Self {
            tick_interval: timer.tick_interval(),
            auto_start_main: timer.auto_start_main,
            guard_foreign_session: presence.enabled && presence.guard_foreign_session,
        }
    }
}

/// Outcome of routing an activity to a slot
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The slot was idle and now runs for `binding`
    Started { binding: ActivityBinding },
    /// The slot already runs for this activity
    Unchanged,
    /// The previous run was finished and recorded; the slot now runs for the new activity
    Switched { record: Record },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatus {
    pub slot: TimerSlot,
    pub binding: Option<ActivityBinding>,
    pub start_reference: Option<DateTime<Utc>>,
    pub display_ms: i64,
    pub memo: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub submitted: usize,
    pub remaining: usize,
}

/// Internal outcome of a gated selection, before the record is submitted
enum Routed {
    Started(ActivityBinding),
    Unchanged,
    Switched(CompletedRun),
}

/// Owns the main and sub stopwatches.
///
/// Each slot has a gate that serializes the check-then-act of a selection, so
/// two concurrent selections can never both finish the same run. Record
/// submission and presence calls happen after the gate is released.
pub struct DualTimerCoordinator {
    main: StopwatchEngine,
    sub: StopwatchEngine,
    main_gate: Mutex<()>,
    sub_gate: Mutex<()>,
    records: Arc<dyn RecordSink>,
    pending: Mutex<PendingRecords>,
    store: Arc<dyn KeyValueStore>,
    presence: Arc<dyn PresenceService>,
    guard_foreign_session: bool,
}

impl DualTimerCoordinator {
    /// Restore both stopwatches from `store`. Only the main slot may auto-start.
    pub async fn restore(
        options: CoordinatorOptions,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        events: Arc<EventManager>,
        records: Arc<dyn RecordSink>,
        presence: Arc<dyn PresenceService>,
    ) -> Result<Self> {
        let auto_start = if options.auto_start_main {
            last_main_binding(store.as_ref())
        } else {
            None
        };

        let main = StopwatchEngine::restore(
            EngineConfig::new(TimerSlot::Main)
                .with_tick_interval(options.tick_interval)
                .with_auto_start(auto_start),
            store.clone(),
            clock.clone(),
            events.clone(),
        )
        .await?;
        let sub = StopwatchEngine::restore(
            EngineConfig::new(TimerSlot::Sub).with_tick_interval(options.tick_interval),
            store.clone(),
            clock,
            events,
        )
        .await?;

        Ok(Self {
            main,
            sub,
            main_gate: Mutex::new(()),
            sub_gate: Mutex::new(()),
            records,
            pending: Mutex::new(PendingRecords::new(store.clone())),
            store,
            presence,
            guard_foreign_session: options.guard_foreign_session,
        })
    }

    pub fn engine(&self, slot: TimerSlot) -> &StopwatchEngine {
        match slot {
            TimerSlot::Main => &self.main,
            TimerSlot::Sub => &self.sub,
        }
    }

    fn gate(&self, slot: TimerSlot) -> &Mutex<()> {
        match slot {
            TimerSlot::Main => &self.main_gate,
            TimerSlot::Sub => &self.sub_gate,
        }
    }

    /// Route a timed activity to the main stopwatch.
    ///
    /// If main is already running for another activity, that run is finished
    /// and its minutes are recorded against the previous activity.
    pub async fn select_for_main(&self, activity: &Activity, details: String) -> Result<Selection> {
        if !activity.is_timed() {
            return Err(CoordinatorError::NotTimed(activity.id));
        }
        if self.guard_foreign_session && self.foreign_presence_active().await {
            return Err(CoordinatorError::PresenceBusy);
        }

        let binding = activity.binding(details);
        let routed = self.route(TimerSlot::Main, binding.clone()).await?;
        if !matches!(routed, Routed::Unchanged) {
            self.remember_main(&binding);
        }
        self.finish_selection(routed).await
    }

    /// Route a timed activity to the sub stopwatch.
    pub async fn select_for_sub(&self, activity: &Activity, details: String) -> Result<Selection> {
        if !activity.is_timed() {
            return Err(CoordinatorError::NotTimed(activity.id));
        }

        let routed = self.route(TimerSlot::Sub, activity.binding(details)).await?;
        self.finish_selection(routed).await
    }

    async fn route(&self, slot: TimerSlot, binding: ActivityBinding) -> Result<Routed> {
        let _gate = self.gate(slot).lock().await;
        let engine = self.engine(slot);

        match engine.binding().await {
            None => {
                engine.start(binding.clone()).await?;
                Ok(Routed::Started(binding))
            }
            Some(current) if current.activity_id == binding.activity_id => {
                tracing::debug!(slot = %slot, activity_id = binding.activity_id, "Reselected running activity");
                Ok(Routed::Unchanged)
            }
            Some(_) => {
                let run = engine.finish_and_reset(binding).await?;
                Ok(Routed::Switched(run))
            }
        }
    }

    async fn finish_selection(&self, routed: Routed) -> Result<Selection> {
        match routed {
            Routed::Started(binding) => Ok(Selection::Started { binding }),
            Routed::Unchanged => Ok(Selection::Unchanged),
            Routed::Switched(run) => {
                let record = self.submit(run.into_record()).await?;
                Ok(Selection::Switched { record })
            }
        }
    }

    /// Finish the run in `slot` and record it. `None` keeps the stored memo.
    pub async fn complete(&self, slot: TimerSlot, memo: Option<String>) -> Result<Record> {
        let run = {
            let _gate = self.gate(slot).lock().await;
            self.engine(slot).complete(memo).await?
        };
        self.submit(run.into_record()).await
    }

    pub async fn cancel(&self, slot: TimerSlot) -> Result<ActivityBinding> {
        let _gate = self.gate(slot).lock().await;
        Ok(self.engine(slot).cancel().await?)
    }

    /// Returns the recomputed display time in milliseconds.
    pub async fn edit_start(&self, slot: TimerSlot, at: DateTime<Utc>) -> Result<i64> {
        let _gate = self.gate(slot).lock().await;
        Ok(self.engine(slot).edit_start_time(at).await?)
    }

    pub async fn set_memo(&self, slot: TimerSlot, memo: String, sync: bool) -> Result<()> {
        let _gate = self.gate(slot).lock().await;
        let engine = self.engine(slot);
        engine.set_memo(memo).await?;
        if sync {
            engine.sync_memo().await?;
        }
        Ok(())
    }

    pub async fn status(&self, slot: TimerSlot) -> SlotStatus {
        let engine = self.engine(slot);
        let state = engine.snapshot().await;
        SlotStatus {
            slot,
            binding: state.binding.clone().filter(|_| state.running),
            start_reference: state.start_reference,
            display_ms: engine.display_time().await,
            memo: state.memo,
        }
    }

    /// Record a manual value for a counted activity. Never touches a stopwatch.
    pub async fn record_count(
        &self,
        activity: &Activity,
        value: i64,
        memo: Option<String>,
    ) -> Result<Record> {
        if activity.is_timed() {
            return Err(CoordinatorError::NotCount(activity.id));
        }
        self.submit(NewRecord::count(activity.id, value, memo)).await
    }

    /// Resubmit queued records, keeping the ones that fail again.
    pub async fn retry_pending(&self) -> Result<RetryReport> {
        let pending = self.pending.lock().await;
        let queued = pending.load()?;

        let mut report = RetryReport::default();
        let mut remaining = Vec::new();
        for record in queued {
            match self.records.create_record(record.clone()).await {
                Ok(_) => report.submitted += 1,
                Err(e) => {
                    tracing::warn!(activity_id = record.activity_id, "Retry failed: {}", e);
                    remaining.push(record);
                }
            }
        }
        report.remaining = remaining.len();
        pending.replace(&remaining)?;

        tracing::info!(
            submitted = report.submitted,
            remaining = report.remaining,
            "Retried pending records"
        );
        Ok(report)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.pending.lock().await.load()?.len())
    }

    /// Hand a record to the sink. A failed submission is queued for retry
    /// unless the sink rejected the record itself.
    async fn submit(&self, record: NewRecord) -> Result<Record> {
        let source = match self.records.create_record(record.clone()).await {
            Ok(saved) => return Ok(saved),
            Err(e) => e,
        };

        let queued = match source {
            RecordSinkError::Rejected(_) => false,
            _ => match self.pending.lock().await.push(record.clone()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        activity_id = record.activity_id,
                        "Failed to queue record: {}",
                        e
                    );
                    false
                }
            },
        };
        tracing::warn!(
            activity_id = record.activity_id,
            queued,
            "Record submission failed: {}",
            source
        );

        Err(CoordinatorError::RecordSink {
            record,
            queued,
            source,
        })
    }

    /// An active presence while both of our stopwatches are idle belongs to
    /// another session. Status failures count as "not active".
    async fn foreign_presence_active(&self) -> bool {
        if self.main.is_running().await || self.sub.is_running().await {
            return false;
        }
        match self.presence.is_active().await {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!("Presence status check failed: {}", e);
                false
            }
        }
    }

    fn remember_main(&self, binding: &ActivityBinding) {
        let result = serde_json::to_string(binding)
            .map_err(actrack_core::Error::from)
            .and_then(|json| self.store.set(LAST_MAIN_KEY, &json));
        if let Err(e) = result {
            tracing::warn!("Failed to remember main activity: {}", e);
        }
    }
}

fn last_main_binding(store: &dyn KeyValueStore) -> Option<ActivityBinding> {
    let raw = match store.get(LAST_MAIN_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!("Failed to read last main activity: {}", e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(binding) => Some(binding),
        Err(e) => {
            tracing::warn!("Ignoring unreadable last main activity: {}", e);
            None
        }
    }
}
