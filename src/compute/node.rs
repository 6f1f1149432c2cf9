//! Nodes and resource handles

use super::json_str;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Path-shaped identifier of a remote resource; also its address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, e.g. the VM name
    pub fn name(&self) -> &str {
        self.0.trim_end_matches('/').rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path of a sub-resource below this one
    pub fn child(&self, segment: &str) -> String {
        format!("{}/{}", self.0.trim_end_matches('/'), segment)
    }

    /// Resource group segment of the handle, if any
    pub fn resource_group(&self) -> Option<&str> {
        let mut segments = self.0.split('/');
        segments
            .by_ref()
            .find(|s| s.eq_ignore_ascii_case("resourceGroups"))?;
        segments.next().filter(|s| !s.is_empty())
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Pending,
    Running,
    Suspended,
    Stopped,
    Unknown,
}

impl NodeState {
    /// `Succeeded` maps to Running; anything else, including a missing
    /// state, is Pending
    pub fn from_provisioning_state(state: Option<&str>) -> Self {
        match state {
            Some("Succeeded") => Self::Running,
            _ => Self::Pending,
        }
    }

    /// Map an instance-view power state code
    pub fn from_power_state(code: Option<&str>) -> Self {
        match code {
            Some("PowerState/stopped") => Self::Suspended,
            Some("PowerState/running") => Self::Running,
            Some("PowerState/deallocated") => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Addresses reachable through a node's network interfaces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeAddresses {
    pub public_ips: Vec<String>,
    pub private_ips: Vec<String>,
}

impl NodeAddresses {
    pub fn extend(&mut self, other: NodeAddresses) {
        self.public_ips.extend(other.public_ips);
        self.private_ips.extend(other.private_ips);
    }
}

/// A virtual machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: ResourceHandle,
    pub name: String,
    pub state: NodeState,
    pub public_ips: Vec<String>,
    pub private_ips: Vec<String>,
    pub extra: Map<String, Value>,
}

impl Node {
    /// Build a node from its raw representation and resolved addresses
    pub fn from_raw(raw: &Value, addresses: NodeAddresses) -> Self {
        let provisioning_state = json_str(raw, &["properties", "provisioningState"]);

        let mut extra = Map::new();
        extra.insert(
            "provisioningState".to_string(),
            provisioning_state.map_or(Value::Null, |s| Value::String(s.to_string())),
        );
        if let Some(location) = json_str(raw, &["location"]) {
            extra.insert("location".to_string(), Value::String(location.to_string()));
        }
        if let Some(size) = json_str(raw, &["properties", "hardwareProfile", "vmSize"]) {
            extra.insert("vmSize".to_string(), Value::String(size.to_string()));
        }

        Self {
            id: ResourceHandle::new(json_str(raw, &["id"]).unwrap_or_default()),
            name: json_str(raw, &["name"]).unwrap_or_default().to_string(),
            state: NodeState::from_provisioning_state(provisioning_state),
            public_ips: addresses.public_ips,
            private_ips: addresses.private_ips,
            extra,
        }
    }

    /// A freshly created node: pending, addresses not yet known
    pub fn pending(id: ResourceHandle, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            state: NodeState::Pending,
            public_ips: Vec::new(),
            private_ips: Vec::new(),
            extra: Map::new(),
        }
    }
}
