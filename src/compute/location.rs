//! Locations and VM sizes

use super::json_str;
use serde::Serialize;
use serde_json::Value;

/// Azure region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

impl Location {
    pub fn new(name: &str) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            display_name: name.to_string(),
        }
    }
}

impl From<&Value> for Location {
    fn from(value: &Value) -> Self {
        let name = json_str(value, &["name"]).unwrap_or("-");
        Self {
            id: name.to_string(),
            name: name.to_string(),
            display_name: json_str(value, &["displayName"]).unwrap_or(name).to_string(),
        }
    }
}

/// VM size available in a location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Size {
    pub id: String,
    pub name: String,
    pub ram_mb: Option<u64>,
    pub disk_mb: Option<u64>,
    pub extra: Value,
}

impl Size {
    pub fn new(name: &str) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            ram_mb: None,
            disk_mb: None,
            extra: Value::Null,
        }
    }
}

impl From<&Value> for Size {
    fn from(value: &Value) -> Self {
        let name = json_str(value, &["name"]).unwrap_or("-");
        Self {
            id: name.to_string(),
            name: name.to_string(),
            ram_mb: value.get("memoryInMB").and_then(|v| v.as_u64()),
            disk_mb: value.get("osDiskSizeInMB").and_then(|v| v.as_u64()),
            extra: value.clone(),
        }
    }
}
