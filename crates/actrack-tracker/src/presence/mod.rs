//! Presence broadcasting ("what am I doing right now")
//!
//! Presence is best-effort: nothing in here may fail or block a timer
//! transition.

pub mod adapter;
pub mod http;

pub use adapter::PresenceSyncAdapter;
pub use http::HttpPresenceService;

use actrack_core::models::{ActivityBinding, PresenceConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Presence service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Presence not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, PresenceError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresencePayload {
    pub group: String,
    pub activity_name: String,
    pub details: String,
    pub asset_key: String,
}

impl PresencePayload {
    pub fn from_binding(binding: &ActivityBinding, details: impl Into<String>) -> Self {
        Self {
            group: binding.group.clone(),
            activity_name: binding.activity_name.clone(),
            details: details.into(),
            asset_key: binding.asset_key.clone(),
        }
    }
}

#[async_trait]
pub trait PresenceService: Send + Sync {
    async fn set_presence(&self, payload: &PresencePayload) -> Result<()>;

    async fn clear_presence(&self, group: &str) -> Result<()>;

    /// Whether some session currently holds a presence.
    async fn is_active(&self) -> Result<bool>;
}

/// Used when presence is disabled.
pub struct NoopPresenceService;

#[async_trait]
impl PresenceService for NoopPresenceService {
    async fn set_presence(&self, payload: &PresencePayload) -> Result<()> {
        tracing::debug!("presence disabled, skipping set for {}", payload.group);
        Ok(())
    }

    async fn clear_presence(&self, group: &str) -> Result<()> {
        tracing::debug!("presence disabled, skipping clear for {}", group);
        Ok(())
    }

    async fn is_active(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Pick the presence service described by the configuration.
pub fn from_config(config: &PresenceConfig) -> Result<Arc<dyn PresenceService>> {
    if !config.enabled {
        return Ok(Arc::new(NoopPresenceService));
    }

    let endpoint = config.endpoint.clone().ok_or_else(|| {
        PresenceError::NotConfigured("presence enabled without an endpoint".to_string())
    })?;
    Ok(Arc::new(HttpPresenceService::new(endpoint, config.timeout())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_config_is_noop() {
        let service = from_config(&PresenceConfig::default()).unwrap();
        assert!(!service.is_active().await.unwrap());
        service.clear_presence("study").await.unwrap();
    }

    #[test]
    fn test_enabled_without_endpoint_fails() {
        let config = PresenceConfig {
            enabled: true,
            ..PresenceConfig::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(PresenceError::NotConfigured(_))
        ));
    }
}
