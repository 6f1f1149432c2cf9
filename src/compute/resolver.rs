//! Link-following address resolution
//!
//! A VM only references its network interfaces; each interface lists IP
//! configurations carrying the private address and a reference to a
//! public IP resource. Resolving a node's addresses therefore takes one
//! fetch per interface and one more per referenced public IP. Fetches run
//! one after another and nothing is cached between calls.

use super::json_str;
use super::node::{NodeAddresses, ResourceHandle};
use crate::azure::client::ArmClient;
use crate::azure::error::{ArmError, Result};
use serde_json::Value;

/// Network interface references embedded in a VM's network profile
pub fn network_interface_refs(raw_node: &Value) -> Vec<ResourceHandle> {
    raw_node
        .get("properties")
        .and_then(|p| p.get("networkProfile"))
        .and_then(|p| p.get("networkInterfaces"))
        .and_then(|v| v.as_array())
        .map(|nics| {
            nics.iter()
                .filter_map(|nic| json_str(nic, &["id"]))
                .filter(|id| !id.is_empty())
                .map(ResourceHandle::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve the public and private addresses of a raw VM.
///
/// Addresses keep interface order, then IP configuration order. Any
/// reference that cannot be fetched or parsed fails the whole resolution.
pub async fn resolve_addresses(client: &ArmClient, raw_node: &Value) -> Result<NodeAddresses> {
    let mut addresses = NodeAddresses::default();

    for nic in network_interface_refs(raw_node) {
        let resolved = resolve_network_interface(client, &nic)
            .await
            .map_err(|e| ArmError::resolution(nic.as_str(), e))?;
        addresses.extend(resolved);
    }

    Ok(addresses)
}

/// Fetch one network interface and collect the addresses of its IP
/// configurations
pub async fn resolve_network_interface(client: &ArmClient, nic: &ResourceHandle) -> Result<NodeAddresses> {
    let raw = fetch_object(client, nic).await?;
    let mut addresses = NodeAddresses::default();

    let ip_configurations = raw
        .get("properties")
        .and_then(|p| p.get("ipConfigurations"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    for ip_configuration in &ip_configurations {
        if let Some(private_ip) = json_str(ip_configuration, &["properties", "privateIPAddress"]) {
            addresses.private_ips.push(private_ip.to_string());
        }

        let Some(public_ip_ref) = json_str(ip_configuration, &["properties", "publicIPAddress", "id"]) else {
            continue;
        };

        let public_ip_ref = ResourceHandle::from(public_ip_ref);
        let public_ip = resolve_public_ip(client, &public_ip_ref)
            .await
            .map_err(|e| ArmError::resolution(public_ip_ref.as_str(), e))?;

        match public_ip {
            Some(ip) => addresses.public_ips.push(ip),
            None => tracing::debug!("Public IP {} has no address allocated", public_ip_ref),
        }
    }

    Ok(addresses)
}

/// Fetch a public IP resource; `None` when no address is allocated yet
pub async fn resolve_public_ip(client: &ArmClient, public_ip: &ResourceHandle) -> Result<Option<String>> {
    let raw = fetch_object(client, public_ip).await?;
    Ok(json_str(&raw, &["properties", "ipAddress"]).map(|s| s.to_string()))
}

/// GET a referenced resource at the default API version; the body must be
/// a JSON object
async fn fetch_object(client: &ArmClient, handle: &ResourceHandle) -> Result<Value> {
    let raw = client.get_json(handle.as_str(), None).await?;

    if !raw.is_object() {
        return Err(ArmError::malformed(handle.as_str(), "expected a JSON object"));
    }

    Ok(raw)
}
