//! Virtual networks, subnets and node network configuration

use super::json_str;
use super::node::ResourceHandle;
use crate::azure::error::{ArmError, Result};
use serde::Serialize;
use serde_json::Value;

/// Subnet of a virtual network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subnet {
    pub id: ResourceHandle,
    pub name: String,
}

impl Subnet {
    pub fn new(id: impl Into<ResourceHandle>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
        }
    }
}

impl From<&Value> for Subnet {
    fn from(value: &Value) -> Self {
        Self {
            id: ResourceHandle::new(json_str(value, &["id"]).unwrap_or_default()),
            name: json_str(value, &["name"]).unwrap_or_default().to_string(),
        }
    }
}

/// Virtual network with the subnets it declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualNetwork {
    pub id: ResourceHandle,
    pub name: String,
    pub location: String,
    pub subnets: Vec<Subnet>,
}

impl VirtualNetwork {
    pub fn new(id: impl Into<ResourceHandle>, name: &str, location: &str, subnets: Vec<Subnet>) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            location: location.to_string(),
            subnets,
        }
    }

    pub fn has_subnet(&self, name: &str) -> bool {
        self.subnets.iter().any(|s| s.name == name)
    }
}

impl From<&Value> for VirtualNetwork {
    /// Subnets are read from the embedded `properties.subnets` list
    fn from(value: &Value) -> Self {
        let subnets = value
            .get("properties")
            .and_then(|p| p.get("subnets"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(Subnet::from).collect())
            .unwrap_or_default();

        Self {
            id: ResourceHandle::new(json_str(value, &["id"]).unwrap_or_default()),
            name: json_str(value, &["name"]).unwrap_or_default().to_string(),
            location: json_str(value, &["location"]).unwrap_or_default().to_string(),
            subnets,
        }
    }
}

/// How the node's public address is obtained
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum PublicIpAllocation {
    /// No public address
    #[default]
    None,
    /// Allocate a new dynamic public IP resource before creating the node
    AllocateNew,
    /// Attach an existing public IP resource
    Existing(ResourceHandle),
}

/// Network placement of a new node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    virtual_network: VirtualNetwork,
    subnet: Subnet,
    public_ip: PublicIpAllocation,
}

impl NetworkConfig {
    /// The subnet must be one the virtual network declares
    pub fn new(virtual_network: VirtualNetwork, subnet: Subnet, public_ip: PublicIpAllocation) -> Result<Self> {
        if !virtual_network.has_subnet(&subnet.name) {
            return Err(ArmError::Validation(format!(
                "Invalid subnet: '{}' is not part of virtual network '{}'",
                subnet.name, virtual_network.name
            )));
        }

        Ok(Self {
            virtual_network,
            subnet,
            public_ip,
        })
    }

    pub fn virtual_network(&self) -> &VirtualNetwork {
        &self.virtual_network
    }

    pub fn subnet(&self) -> &Subnet {
        &self.subnet
    }

    pub fn public_ip(&self) -> &PublicIpAllocation {
        &self.public_ip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VNET_ID: &str = "/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.Network/virtualNetworks/vnet1";

    fn vnet() -> VirtualNetwork {
        VirtualNetwork::new(
            VNET_ID,
            "vnet1",
            "westeurope",
            vec![Subnet::new(format!("{}/subnets/default", VNET_ID), "default")],
        )
    }

    #[test]
    fn test_config_accepts_declared_subnet() {
        let subnet = vnet().subnets[0].clone();
        let config = NetworkConfig::new(vnet(), subnet, PublicIpAllocation::AllocateNew).unwrap();
        assert_eq!(config.subnet().name, "default");
        assert_eq!(config.public_ip(), &PublicIpAllocation::AllocateNew);
    }

    #[test]
    fn test_config_rejects_foreign_subnet() {
        let subnet = Subnet::new("/elsewhere/subnets/other", "other");
        let err = NetworkConfig::new(vnet(), subnet, PublicIpAllocation::None).unwrap_err();
        assert!(matches!(err, ArmError::Validation(_)));
    }

    #[test]
    fn test_network_from_value_reads_embedded_subnets() {
        let network = VirtualNetwork::from(&json!({
            "id": VNET_ID,
            "name": "vnet1",
            "location": "westeurope",
            "properties": {
                "subnets": [
                    {"id": format!("{}/subnets/a", VNET_ID), "name": "a"},
                    {"id": format!("{}/subnets/b", VNET_ID), "name": "b"}
                ]
            }
        }));

        assert_eq!(network.subnets.len(), 2);
        assert!(network.has_subnet("b"));
        assert!(!network.has_subnet("c"));
    }
}
