pub mod activity;
pub mod config;
pub mod record;
pub mod timer;

pub use activity::{Activity, ActivityBinding, ActivityUnit, DEFAULT_ASSET_KEY};
pub use config::{Config, PresenceConfig, TimerConfig};
pub use record::{NewRecord, Record, RecordValue};
pub use timer::{format_elapsed, TimerSlot, TimerState};
