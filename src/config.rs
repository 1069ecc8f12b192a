//! Configuration for the backend gateway and the workflow orchestrator.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};
use crate::session::AspectRatio;

/// Default interval between video job polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Backend gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Action-dispatched RPC endpoint URL.
    pub endpoint: String,

    /// API key sent as bearer token and `apikey` header.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl GatewayConfig {
    /// Creates a config pointing at the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout_secs: Some(300),
        }
    }

    /// Builder: Set API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Builder: Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Save configuration to JSON.
    pub fn save(&self, path: &Path) -> StudioResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| StudioError::config(format!("cannot write {}: {e}", path.display())))
    }

    /// Load configuration from JSON.
    pub fn load(path: &Path) -> StudioResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| StudioError::config(format!("cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Fixed interval of the shared video polling loop.
    pub poll_interval: Duration,
    /// Aspect ratio used until the user confirms setup.
    pub default_aspect_ratio: AspectRatio,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_aspect_ratio: AspectRatio::Portrait,
        }
    }
}

impl WorkflowConfig {
    /// Builder: Set poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder: Set default aspect ratio.
    pub fn with_default_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.default_aspect_ratio = ratio;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_builder() {
        let config = GatewayConfig::new("https://example.supabase.co/functions/v1/gemini-service")
            .with_api_key("anon-key")
            .with_timeout(60);

        assert_eq!(config.api_key.as_deref(), Some("anon-key"));
        assert_eq!(config.timeout_secs, Some(60));
    }

    #[test]
    fn test_gateway_config_save_and_load() {
        let path = std::env::temp_dir().join(format!("studio-config-{}.json", uuid::Uuid::new_v4()));
        let config = GatewayConfig::new("http://localhost:54321").with_api_key("k");
        config.save(&path).unwrap();

        let loaded = GatewayConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_workflow_config_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.default_aspect_ratio, AspectRatio::Portrait);
    }
}
