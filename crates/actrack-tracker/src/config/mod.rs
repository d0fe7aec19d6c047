pub mod manager;

pub use manager::{ConfigManager, ConfigManagerError, PresenceConfigUpdate, TimerConfigUpdate};
