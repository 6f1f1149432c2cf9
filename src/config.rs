//! Configuration Management
//!
//! [`ClientConfig`] carries the connection defaults used by the ARM client.
//! [`Config`] is the persisted user configuration of the `armctl` binary.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Resource Manager endpoint host
pub const DEFAULT_HOST: &str = "management.azure.com";

/// API version used when an operation does not ask for a specific one
pub const DEFAULT_API_VERSION: &str = "2016-07-01";

/// Rate-limited retries allowed for one logical request
pub const MAX_RETRIES: u32 = 5;

/// Redirects followed for one logical request
pub const MAX_REDIRECTS: u32 = 10;

/// Pages fetched for one paged listing
pub const MAX_PAGES: u32 = 1000;

/// Connection settings for the ARM client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub scheme: String,
    pub host: String,
    pub default_api_version: String,
    pub max_retries: u32,
    pub max_redirects: u32,
    pub max_pages: u32,
    pub user_agent: String,
    /// Per-attempt timeout enforced by the HTTP client
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: DEFAULT_HOST.to_string(),
            default_api_version: DEFAULT_API_VERSION.to_string(),
            max_retries: MAX_RETRIES,
            max_redirects: MAX_REDIRECTS,
            max_pages: MAX_PAGES,
            user_agent: format!("armctl/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    /// Point the client at a plain-HTTP endpoint such as a local mock server
    pub fn for_endpoint(scheme: &str, host: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            ..Self::default()
        }
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Last used subscription
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Default resource group for node listings
    #[serde(default)]
    pub resource_group: Option<String>,
    /// Default location for catalog walks
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("armctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_json(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse a config document, falling back to defaults when it is unreadable
    pub fn from_json(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_default()
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective subscription (config > environment > Azure CLI default)
    pub fn effective_subscription(&self) -> Option<String> {
        self.subscription_id
            .clone()
            .or_else(crate::azure::auth::get_default_subscription)
    }

    /// Set subscription and save
    pub fn set_subscription(&mut self, subscription_id: &str) -> Result<()> {
        self.subscription_id = Some(subscription_id.to_string());
        self.save()
    }
}
