//! Actrack tracker library
//!
//! The stopwatch engine, dual-timer coordinator, presence sync and record
//! sinks, exposed as a library for the `actrack` binary and for testing.

pub mod cli;
pub mod config;
pub mod event_manager;
pub mod presence;
pub mod record;
pub mod timer;

#[cfg(test)]
mod testing;

pub use config::ConfigManager;
pub use event_manager::EventManager;
pub use presence::{HttpPresenceService, PresenceService, PresenceSyncAdapter};
pub use record::{CsvRecordSink, PendingRecords, RecordSink};
pub use timer::{
    CoordinatorError, CoordinatorOptions, DualTimerCoordinator, Selection, StopwatchEngine,
    TimerEvent, TimerEventType,
};
