//! Recording fakes for the external collaborators

use actrack_core::models::{ActivityBinding, NewRecord, Record};
use actrack_core::Clock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::presence::{self, PresenceError, PresencePayload, PresenceService};
use crate::record::{self, RecordSink, RecordSinkError};

pub(crate) fn binding(id: i64) -> ActivityBinding {
    ActivityBinding {
        activity_id: id,
        activity_name: format!("Activity {}", id),
        group: "study".to_string(),
        asset_key: "default_image".to_string(),
        details: String::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PresenceCall {
    Set(PresencePayload),
    Clear(String),
}

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub(crate) struct RecordingPresence {
    calls: Mutex<Vec<PresenceCall>>,
    failing: AtomicBool,
    active: AtomicBool,
    delay: Option<Duration>,
    on_call: Option<Hook>,
}

impl RecordingPresence {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` and then runs `hook`.
    pub(crate) fn slow(delay: Duration, hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            delay: Some(delay),
            on_call: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<PresenceCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: PresenceCall) -> presence::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(hook) = &self.on_call {
            hook();
        }
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PresenceError::NotConfigured("service down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceService for RecordingPresence {
    async fn set_presence(&self, payload: &PresencePayload) -> presence::Result<()> {
        self.record(PresenceCall::Set(payload.clone())).await
    }

    async fn clear_presence(&self, group: &str) -> presence::Result<()> {
        self.record(PresenceCall::Clear(group.to_string())).await
    }

    async fn is_active(&self) -> presence::Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PresenceError::NotConfigured("service down".to_string()));
        }
        Ok(self.active.load(Ordering::SeqCst))
    }
}

pub(crate) struct RecordingSink {
    records: Mutex<Vec<Record>>,
    failing: AtomicBool,
    rejecting: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl RecordingSink {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            rejecting: AtomicBool::new(false),
            clock,
        }
    }

    /// Offline: every submission fails with a transient storage error.
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every submission is refused as invalid.
    pub(crate) fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub(crate) fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn create_record(&self, record: NewRecord) -> record::Result<Record> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RecordSinkError::Storage(actrack_core::Error::Io(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "sink offline"),
            )));
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(RecordSinkError::Rejected("value out of range".to_string()));
        }
        let record = record.into_record(self.clock.now());
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }
}
