pub mod coordinator;
pub mod engine;
pub mod events;


pub use coordinator::{
    CoordinatorError, CoordinatorOptions, DualTimerCoordinator, RetryReport, Selection,
    SlotStatus,
};
pub use engine::{CompletedRun, EngineConfig, StopwatchEngine, TimerEngineError};
pub use events::{TimerEvent, TimerEventType};
