//! Presence service reached over HTTP

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{PresenceError, PresencePayload, PresenceService, Result};

pub struct HttpPresenceService {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    connected: bool,
}

impl HttpPresenceService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/discord_presence/{}", self.endpoint, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PresenceError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PresenceService for HttpPresenceService {
    async fn set_presence(&self, payload: &PresencePayload) -> Result<()> {
        let response = self
            .client
            .post(self.url("start"))
            .json(payload)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn clear_presence(&self, group: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("stop"))
            .json(&json!({ "group": group }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn is_active(&self) -> Result<bool> {
        let response = self.client.get(self.url("status")).send().await?;
        let status: StatusResponse = Self::check(response).await?.json().await?;
        Ok(status.connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let service =
            HttpPresenceService::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            service.url("start"),
            "http://localhost:5000/api/discord_presence/start"
        );
        assert_eq!(
            service.url("status"),
            "http://localhost:5000/api/discord_presence/status"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_reports_error() {
        // Port 9 (discard) on loopback is expected to refuse connections.
        let service =
            HttpPresenceService::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(service.is_active().await.is_err());
    }
}
