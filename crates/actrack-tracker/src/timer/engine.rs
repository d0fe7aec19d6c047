use actrack_core::models::{ActivityBinding, NewRecord, TimerSlot, TimerState};
use actrack_core::storage::KeyValueStore;
use actrack_core::Clock;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::events::{TimerEvent, TimerEventType};
use crate::event_manager::EventManager;

#[derive(Debug, thiserror::Error)]
pub enum TimerEngineError {
    #[error("Timer already running")]
    AlreadyRunning,

    #[error("Timer is not running")]
    NotRunning,

    #[error("Start time {requested} is in the future (now {now})")]
    InvalidTime {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[source] actrack_core::Error),

    #[error("Inconsistent timer state: {0}")]
    Inconsistent(String),
}

impl From<actrack_core::Error> for TimerEngineError {
    fn from(err: actrack_core::Error) -> Self {
        match err {
            actrack_core::Error::Inconsistent(msg) => TimerEngineError::Inconsistent(msg),
            other => TimerEngineError::Persistence(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TimerEngineError>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub slot: TimerSlot,
    pub tick_interval: Duration,
    /// Binding to start with when no snapshot was persisted
    pub auto_start: Option<ActivityBinding>,
}

impl EngineConfig {
    pub fn new(slot: TimerSlot) -> Self {
        Self {
            slot,
            tick_interval: Duration::from_secs(1),
            auto_start: None,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_auto_start(mut self, binding: Option<ActivityBinding>) -> Self {
        self.auto_start = binding;
        self
    }
}

/// The outcome of a finished run, handed off exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub slot: TimerSlot,
    pub binding: ActivityBinding,
    pub elapsed_ms: i64,
    pub elapsed_minutes: f64,
    pub memo: Option<String>,
}

impl CompletedRun {
    pub fn into_record(self) -> NewRecord {
        NewRecord::minutes(self.binding.activity_id, self.elapsed_minutes, self.memo)
    }
}

/// One persistent, crash-recoverable stopwatch.
///
/// Every operation runs under a single lock, persists before mutating the
/// in-memory state, and emits its lifecycle event while still holding the
/// lock so subscribers observe transitions in order.
pub struct StopwatchEngine {
    shared: Arc<Shared>,
}

struct Shared {
    slot: TimerSlot,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    events: Arc<EventManager>,
    tick_interval: Duration,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: TimerState,
    ticker: Option<JoinHandle<()>>,
    ticker_spawns: u64,
}

impl StopwatchEngine {
    /// Rehydrate the engine from its persisted snapshot.
    ///
    /// A running snapshot keeps running from its stored start reference, so
    /// downtime counts as tracked time.
    pub async fn restore(
        config: EngineConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        events: Arc<EventManager>,
    ) -> Result<Self> {
        let state = load_snapshot(config.slot, store.as_ref())?;

        let engine = Self {
            shared: Arc::new(Shared {
                slot: config.slot,
                store,
                clock,
                events,
                tick_interval: config.tick_interval,
                inner: Mutex::new(Inner {
                    state,
                    ..Inner::default()
                }),
            }),
        };

        let recovered = {
            let mut inner = engine.shared.inner.lock().await;
            if inner.state.running {
                let now = engine.shared.clock.now();
                tracing::info!(
                    slot = %config.slot,
                    elapsed_ms = inner.state.elapsed_ms(now),
                    "Recovered running stopwatch"
                );
                engine.ensure_ticker(&mut inner);
            }
            inner.state.running
        };

        if !recovered {
            if let Some(binding) = config.auto_start {
                tracing::info!(
                    slot = %config.slot,
                    activity_id = binding.activity_id,
                    "Auto-starting stopwatch"
                );
                engine.start(binding).await?;
            }
        }

        Ok(engine)
    }

    pub fn slot(&self) -> TimerSlot {
        self.shared.slot
    }

    pub async fn start(&self, binding: ActivityBinding) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        if inner.state.running {
            return Err(TimerEngineError::AlreadyRunning);
        }

        let now = self.shared.clock.now();
        let next = TimerState::started(now, binding.clone());
        self.shared.persist(&next)?;
        inner.state = next;
        self.ensure_ticker(&mut inner);

        tracing::info!(
            slot = %self.shared.slot,
            activity_id = binding.activity_id,
            "Stopwatch started"
        );
        self.shared
            .events
            .emit_timer(TimerEvent::started(self.shared.slot, binding, now));

        Ok(())
    }

    /// Current display time in milliseconds. Pure read.
    pub async fn display_time(&self) -> i64 {
        let inner = self.shared.inner.lock().await;
        inner.state.elapsed_ms(self.shared.clock.now())
    }

    /// Move the start of the current run, e.g. to account for a forgotten start.
    /// Returns the recomputed display time.
    pub async fn edit_start_time(&self, new_start: DateTime<Utc>) -> Result<i64> {
        let mut inner = self.shared.inner.lock().await;
        let now = self.shared.clock.now();
        if new_start > now {
            return Err(TimerEngineError::InvalidTime {
                requested: new_start,
                now,
            });
        }
        if !inner.state.running {
            return Err(TimerEngineError::NotRunning);
        }

        let mut next = inner.state.clone();
        next.start_reference = Some(new_start);
        self.shared.persist(&next)?;
        inner.state = next;

        tracing::info!(slot = %self.shared.slot, start = %new_start, "Start time edited");
        self.shared.events.emit_timer(TimerEvent::new(
            TimerEventType::StartEdited {
                start_reference: new_start,
            },
            self.shared.slot,
            now,
        ));

        Ok(inner.state.elapsed_ms(now))
    }

    /// Finish the run. `None` keeps the memo stored with the run.
    pub async fn complete(&self, memo: Option<String>) -> Result<CompletedRun> {
        let mut inner = self.shared.inner.lock().await;
        if !inner.state.running {
            return Err(TimerEngineError::NotRunning);
        }

        // Elapsed time is fixed here, before anything can suspend.
        let now = self.shared.clock.now();
        let run = self.finished_run(&inner.state, now, memo)?;

        self.shared.clear()?;
        inner.state = TimerState::idle();
        stop_ticker(&mut inner);

        tracing::info!(
            slot = %self.shared.slot,
            activity_id = run.binding.activity_id,
            minutes = run.elapsed_minutes,
            "Stopwatch completed"
        );
        self.shared.events.emit_timer(TimerEvent::completed(
            self.shared.slot,
            run.binding.clone(),
            run.elapsed_minutes,
            run.memo.clone(),
            now,
        ));

        Ok(run)
    }

    /// Discard the run without producing a record.
    pub async fn cancel(&self) -> Result<ActivityBinding> {
        let mut inner = self.shared.inner.lock().await;
        if !inner.state.running {
            return Err(TimerEngineError::NotRunning);
        }

        let binding = bound(&inner.state)?;
        self.shared.clear()?;
        inner.state = TimerState::idle();
        stop_ticker(&mut inner);

        tracing::info!(slot = %self.shared.slot, activity_id = binding.activity_id, "Stopwatch cancelled");
        self.shared.events.emit_timer(TimerEvent::cancelled(
            self.shared.slot,
            binding.clone(),
            self.shared.clock.now(),
        ));

        Ok(binding)
    }

    /// Finish the current run and immediately start a new one for `new_binding`.
    ///
    /// The swap is a single persisted write: the store holds either the old
    /// run or the new one, never neither.
    pub async fn finish_and_reset(&self, new_binding: ActivityBinding) -> Result<CompletedRun> {
        let mut inner = self.shared.inner.lock().await;
        if !inner.state.running {
            return Err(TimerEngineError::NotRunning);
        }

        let now = self.shared.clock.now();
        let run = self.finished_run(&inner.state, now, None)?;

        let next = TimerState::started(now, new_binding.clone());
        self.shared.persist(&next)?;
        inner.state = next;
        self.ensure_ticker(&mut inner);

        tracing::info!(
            slot = %self.shared.slot,
            from = run.binding.activity_id,
            to = new_binding.activity_id,
            minutes = run.elapsed_minutes,
            "Stopwatch retargeted"
        );
        self.shared.events.emit_timer(TimerEvent::completed(
            self.shared.slot,
            run.binding.clone(),
            run.elapsed_minutes,
            run.memo.clone(),
            now,
        ));
        self.shared
            .events
            .emit_timer(TimerEvent::started(self.shared.slot, new_binding, now));

        Ok(run)
    }

    pub async fn set_memo(&self, memo: impl Into<String>) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        if !inner.state.running {
            return Err(TimerEngineError::NotRunning);
        }

        let mut next = inner.state.clone();
        next.memo = memo.into();
        self.shared.persist(&next)?;
        inner.state = next;
        Ok(())
    }

    /// Ask subscribers to publish the current memo as presence details.
    pub async fn sync_memo(&self) -> Result<()> {
        let inner = self.shared.inner.lock().await;
        if !inner.state.running {
            return Err(TimerEngineError::NotRunning);
        }

        let binding = bound(&inner.state)?;
        self.shared.events.emit_timer(TimerEvent::new(
            TimerEventType::SyncMemo {
                binding,
                memo: inner.state.memo.clone(),
            },
            self.shared.slot,
            self.shared.clock.now(),
        ));
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.shared.inner.lock().await.state.running
    }

    pub async fn binding(&self) -> Option<ActivityBinding> {
        let inner = self.shared.inner.lock().await;
        if inner.state.running {
            inner.state.binding.clone()
        } else {
            None
        }
    }

    pub async fn current_start_time(&self) -> Option<DateTime<Utc>> {
        self.shared.inner.lock().await.state.start_reference
    }

    pub async fn snapshot(&self) -> TimerState {
        self.shared.inner.lock().await.state.clone()
    }

    /// Whether the display refresh task is alive.
    pub async fn is_ticking(&self) -> bool {
        let inner = self.shared.inner.lock().await;
        inner.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    #[cfg(test)]
    pub(crate) async fn ticker_spawns(&self) -> u64 {
        self.shared.inner.lock().await.ticker_spawns
    }

    fn finished_run(
        &self,
        state: &TimerState,
        now: DateTime<Utc>,
        memo: Option<String>,
    ) -> Result<CompletedRun> {
        state.validate()?;
        let binding = bound(state)?;
        let elapsed_ms = state.elapsed_ms(now);
        let memo = memo
            .or_else(|| Some(state.memo.clone()))
            .filter(|m| !m.trim().is_empty());

        Ok(CompletedRun {
            slot: self.shared.slot,
            binding,
            elapsed_ms,
            elapsed_minutes: actrack_core::models::timer::ms_to_minutes(elapsed_ms),
            memo,
        })
    }

    /// Spawn the refresh task unless one is already alive.
    fn ensure_ticker(&self, inner: &mut Inner) {
        if inner.ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        inner.ticker_spawns += 1;
        let shared = Arc::downgrade(&self.shared);
        inner.ticker = Some(tokio::spawn(tick_loop(shared, self.shared.tick_interval)));
    }
}

impl Shared {
    fn persist(&self, state: &TimerState) -> Result<()> {
        state.validate()?;
        let json = serde_json::to_string(state)
            .map_err(|e| TimerEngineError::Persistence(e.into()))?;
        self.store.set(self.slot.storage_key(), &json)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.store.delete(self.slot.storage_key())?;
        Ok(())
    }
}

fn bound(state: &TimerState) -> Result<ActivityBinding> {
    state
        .binding
        .clone()
        .ok_or_else(|| TimerEngineError::Inconsistent("running timer has no binding".to_string()))
}

fn stop_ticker(inner: &mut Inner) {
    if let Some(ticker) = inner.ticker.take() {
        ticker.abort();
    }
}

/// Publishes the display time while the engine runs. Elapsed time is always
/// derived from the stored start reference, so missed ticks lose nothing.
async fn tick_loop(shared: Weak<Shared>, period: Duration) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately
    ticks.tick().await;

    loop {
        ticks.tick().await;

        let Some(shared) = shared.upgrade() else {
            break;
        };
        let inner = shared.inner.lock().await;
        // A finished run must never be resurrected by a late tick.
        if !inner.state.running {
            break;
        }
        let now = shared.clock.now();
        let display_ms = inner.state.elapsed_ms(now);
        drop(inner);

        shared
            .events
            .emit_timer(TimerEvent::tick(shared.slot, display_ms, now));
    }
}

/// Read the persisted snapshot for `slot`.
///
/// An unreadable or inconsistent snapshot is moved to `<key>.corrupt` and the
/// engine starts idle.
fn load_snapshot(slot: TimerSlot, store: &dyn KeyValueStore) -> Result<TimerState> {
    let key = slot.storage_key();
    let Some(raw) = store.get(key)? else {
        return Ok(TimerState::idle());
    };

    let parsed = serde_json::from_str::<TimerState>(&raw)
        .map_err(actrack_core::Error::from)
        .and_then(|state| state.validate().map(|()| state));

    match parsed {
        Ok(state) if state.running => Ok(state),
        Ok(_) => {
            store.delete(key)?;
            Ok(TimerState::idle())
        }
        Err(e) => {
            tracing::error!(slot = %slot, "Quarantining unreadable timer snapshot: {}", e);
            store.set(&format!("{}.corrupt", key), &raw)?;
            store.delete(key)?;
            Ok(TimerState::idle())
        }
    }
}
