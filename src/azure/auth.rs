//! Azure credentials
//!
//! The bearer token is obtained elsewhere (for instance with
//! `az account get-access-token`) and handed to the client as an opaque
//! string. This module only discovers it and the default subscription.

use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Environment variable holding the bearer token
pub const TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Environment variable holding the subscription id
pub const SUBSCRIPTION_ENV: &str = "AZURE_SUBSCRIPTION_ID";

/// Bearer token holder
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the token from the environment
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// Security: never print the token itself
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Get the Azure CLI configuration directory
pub fn get_azure_config_dir() -> Option<PathBuf> {
    // Check AZURE_CONFIG_DIR environment variable first
    if let Ok(path) = std::env::var("AZURE_CONFIG_DIR") {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|p| p.join(".azure"))
}

/// Validate a subscription id: a GUID in 8-4-4-4-12 hex groups
pub fn validate_subscription_id(subscription: &str) -> bool {
    // Only the hyphenated form is 36 characters long
    subscription.len() == 36 && uuid::Uuid::try_parse(subscription).is_ok()
}

/// Pick the default subscription out of an `azureProfile.json` document
pub fn default_subscription_from_profile(content: &str) -> Option<String> {
    // The Azure CLI writes the profile with a UTF-8 BOM
    let content = content.trim_start_matches('\u{feff}');
    let profile: Value = serde_json::from_str(content).ok()?;

    profile
        .get("subscriptions")?
        .as_array()?
        .iter()
        .find(|s| s.get("isDefault").and_then(|v| v.as_bool()).unwrap_or(false))
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .filter(|id| validate_subscription_id(id))
        .map(|id| id.to_string())
}

/// Read the default subscription from the environment or the Azure CLI profile
/// Security: Validates subscription id format before returning
pub fn get_default_subscription() -> Option<String> {
    if let Ok(subscription) = std::env::var(SUBSCRIPTION_ENV) {
        if validate_subscription_id(&subscription) {
            return Some(subscription);
        }
        tracing::warn!("Invalid subscription id format in {}", SUBSCRIPTION_ENV);
    }

    let profile_path = get_azure_config_dir()?.join("azureProfile.json");
    let content = std::fs::read_to_string(profile_path).ok()?;
    default_subscription_from_profile(&content)
}
