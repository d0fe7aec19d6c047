pub mod activity;
pub mod config;
pub mod kv;
pub mod record;

pub use activity::ActivityCatalog;
pub use config::ConfigStorage;
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use record::{ActivitySummary, RecordStorage};

use crate::{Error, Result};
use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "ACTRACK_DATA_DIR";
pub const CONFIG_DIR_ENV: &str = "ACTRACK_CONFIG_DIR";

pub fn get_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|d| d.join("actrack"))
        .ok_or_else(|| Error::NotFound("Could not find data directory".to_string()))
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|d| d.join("actrack"))
        .ok_or_else(|| Error::NotFound("Could not find config directory".to_string()))
}

pub fn init_data_dir() -> Result<PathBuf> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(data_dir.join("state"))?;
    Ok(data_dir)
}

pub fn init_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}
