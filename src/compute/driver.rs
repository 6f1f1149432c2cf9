//! Compute driver
//!
//! Implements the node lifecycle (create, list, reboot, destroy) and the
//! listings that support it on top of [`ArmClient`].

use super::catalog;
use super::image::Image;
use super::json_str;
use super::location::{Location, Size};
use super::network::{NetworkConfig, PublicIpAllocation, Subnet, VirtualNetwork};
use super::node::{Node, NodeState, ResourceHandle};
use super::resolver;
use crate::azure::client::ArmClient;
use crate::azure::error::{ArmError, Result};
use crate::azure::request::RequestBody;
use serde_json::{json, Value};
use std::collections::HashSet;

/// API version of the VM and network listing endpoints
pub const COMPUTE_API_VERSION: &str = "2016-03-30";

/// API version of the restart action
pub const RESTART_API_VERSION: &str = "2015-06-15";

/// OS disk of a new node, stored as a VHD in a storage account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsDisk {
    pub account: String,
    pub size_gb: u32,
}

/// Empty data disk attached to a new node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDisk {
    pub account: String,
    pub size_gb: u32,
}

/// Everything needed to create a node
#[derive(Debug, Clone)]
pub struct CreateNode {
    pub name: String,
    pub location: Location,
    pub size: Size,
    pub resource_group: String,
    pub network_config: Option<NetworkConfig>,
    pub admin_username: String,
    pub image: Image,
    pub os_disk: OsDisk,
    pub data_disks: Vec<DataDisk>,
    pub availability_set: Option<String>,
    pub public_key: Option<String>,
}

impl CreateNode {
    pub fn new(
        name: &str,
        location: Location,
        size: Size,
        resource_group: &str,
        image: Image,
        admin_username: &str,
        os_disk: OsDisk,
    ) -> Self {
        Self {
            name: name.to_string(),
            location,
            size,
            resource_group: resource_group.to_string(),
            network_config: None,
            admin_username: admin_username.to_string(),
            image,
            os_disk,
            data_disks: Vec::new(),
            availability_set: None,
            public_key: None,
        }
    }

    pub fn network_config(mut self, config: NetworkConfig) -> Self {
        self.network_config = Some(config);
        self
    }

    pub fn data_disk(mut self, disk: DataDisk) -> Self {
        self.data_disks.push(disk);
        self
    }

    pub fn availability_set(mut self, name: &str) -> Self {
        self.availability_set = Some(name.to_string());
        self
    }

    pub fn public_key(mut self, key: &str) -> Self {
        self.public_key = Some(key.to_string());
        self
    }

    /// Check the request before anything is created remotely
    pub fn validate(&self) -> Result<&NetworkConfig> {
        let Some(config) = &self.network_config else {
            return Err(ArmError::Validation(
                "Network configuration needed, e.g. NetworkConfig::new(network, subnet, public_ip)".to_string(),
            ));
        };

        if !config
            .virtual_network()
            .id
            .as_str()
            .contains(self.resource_group.as_str())
        {
            return Err(ArmError::Validation(format!(
                "Resource group '{}' and virtual network '{}' do not match. Use a network within the resource group",
                self.resource_group,
                config.virtual_network().id
            )));
        }

        Ok(config)
    }
}

fn vhd_uri(account: &str, disk_name: &str) -> String {
    format!("http://{}.blob.core.windows.net/vhds/{}.vhd", account, disk_name)
}

/// Fail when a successful response still carries an `error` payload
fn reject_error_payload(method: &str, path: &str, status: u16, body: &Value) -> Result<()> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };

    let message = error
        .get("message")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| error.to_string());

    Err(ArmError::Remote {
        method: method.to_string(),
        path: path.to_string(),
        status,
        message,
    })
}

/// Turn a `nextLink` URL into a request path
fn next_link_path(link: &str) -> Result<String> {
    if link.starts_with('/') {
        return Ok(link.to_string());
    }

    let url = url::Url::parse(link).map_err(|e| ArmError::malformed(link, format!("invalid nextLink: {}", e)))?;
    let path = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());

    Ok(match url.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    })
}

/// Compute driver over one subscription
#[derive(Clone)]
pub struct ArmNodeDriver {
    client: ArmClient,
}

impl ArmNodeDriver {
    pub fn new(client: ArmClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ArmClient {
        &self.client
    }

    /// Fetch every `value` entry of a list endpoint, following `nextLink`
    async fn list_values(&self, path: &str, api_version: Option<&str>) -> Result<Vec<Value>> {
        let max_pages = self.client.config().max_pages;
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(path.to_string());

        while let Some(page_path) = next.take() {
            if visited.len() as u32 >= max_pages || !visited.insert(page_path.clone()) {
                tracing::warn!("Paged listing of {} stopped at {}", path, page_path);
                return Err(ArmError::PagingLoop {
                    path: path.to_string(),
                    pages: visited.len() as u32,
                });
            }

            let page = self.client.get_json(&page_path, api_version).await?;

            let Some(values) = page.get("value").and_then(|v| v.as_array()) else {
                return Err(ArmError::malformed(&page_path, "missing 'value' list"));
            };
            items.extend(values.iter().cloned());

            if let Some(link) = page.get("nextLink").and_then(|v| v.as_str()) {
                next = Some(next_link_path(link)?);
            }
        }

        Ok(items)
    }

    // =========================================================================
    // Locations and sizes
    // =========================================================================

    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        let path = self.client.subscription_path("locations");
        let values = self.list_values(&path, None).await?;
        Ok(values.iter().map(Location::from).collect())
    }

    /// VM sizes available in `location`
    pub async fn list_sizes(&self, location: &str) -> Result<Vec<Size>> {
        let path = self.client.subscription_path(&format!(
            "providers/Microsoft.Compute/locations/{}/vmSizes",
            location
        ));
        let values = self.list_values(&path, Some(COMPUTE_API_VERSION)).await?;
        Ok(values.iter().map(Size::from).collect())
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// List nodes in the subscription, or in one resource group, with their
    /// addresses resolved
    pub async fn list_nodes(&self, resource_group: Option<&str>) -> Result<Vec<Node>> {
        let path = match resource_group {
            Some(group) => self
                .client
                .resource_group_path(group, "providers/Microsoft.Compute/virtualMachines"),
            None => self
                .client
                .subscription_path("providers/Microsoft.Compute/virtualMachines"),
        };

        let raw_nodes = self.list_values(&path, Some(COMPUTE_API_VERSION)).await?;

        let mut nodes = Vec::with_capacity(raw_nodes.len());
        for raw in &raw_nodes {
            nodes.push(self.to_node(raw).await?);
        }

        tracing::debug!("Listed {} nodes", nodes.len());
        Ok(nodes)
    }

    /// Fetch and resolve a single node
    pub async fn get_node(&self, id: &ResourceHandle) -> Result<Node> {
        let raw = self
            .client
            .get_json(id.as_str(), Some(COMPUTE_API_VERSION))
            .await?;
        self.to_node(&raw).await
    }

    async fn to_node(&self, raw: &Value) -> Result<Node> {
        let addresses = resolver::resolve_addresses(&self.client, raw).await?;
        Ok(Node::from_raw(raw, addresses))
    }

    /// Create a node along with its network interface (and public IP).
    ///
    /// The returned node is Pending and has no addresses yet.
    pub async fn create_node(&self, request: &CreateNode) -> Result<Node> {
        let network_config = request.validate()?;
        let name = request.name.as_str();

        tracing::info!("Creating node {} in resource group {}", name, request.resource_group);

        let nic = self
            .create_network_interface(name, &request.resource_group, &request.location, network_config)
            .await?;
        let nic_path = self.client.resource_group_path(
            &request.resource_group,
            &format!("providers/Microsoft.Network/networkInterfaces/{}-nic", name),
        );
        let nic_id = json_str(&nic, &["id"])
            .ok_or_else(|| ArmError::malformed(&nic_path, "network interface without id"))?;

        let os_disk_name = format!("{}-os-disk", name);
        let mut payload = json!({
            "name": name,
            "location": request.location.id,
            "properties": {
                "hardwareProfile": {
                    "vmSize": request.size.id
                },
                "storageProfile": {
                    "imageReference": request.image.image_reference(),
                    "osDisk": {
                        "name": os_disk_name,
                        "vhd": {
                            "uri": vhd_uri(&request.os_disk.account, &os_disk_name)
                        },
                        "caching": "ReadWrite",
                        "createOption": "fromImage",
                        "diskSizeGB": request.os_disk.size_gb
                    }
                },
                "osProfile": {
                    "computerName": name,
                    "adminUsername": request.admin_username,
                    "linuxConfiguration": {
                        "disablePasswordAuthentication": true,
                        "ssh": {
                            "publicKeys": [{
                                "path": format!("/home/{}/.ssh/authorized_keys", request.admin_username),
                                "keyData": request.public_key
                            }]
                        }
                    }
                },
                "networkProfile": {
                    "networkInterfaces": [{
                        "id": nic_id,
                        "properties": {
                            "primary": true
                        }
                    }]
                }
            }
        });

        if !request.data_disks.is_empty() {
            // Every data disk is attached at LUN 0
            let lun = 0;
            let data_disks: Vec<Value> = request
                .data_disks
                .iter()
                .enumerate()
                .map(|(i, disk)| {
                    let disk_name = format!("{}-data-disk-{}", name, i);
                    json!({
                        "name": disk_name,
                        "diskSizeGB": disk.size_gb,
                        "lun": lun,
                        "vhd": {
                            "uri": vhd_uri(&disk.account, &disk_name)
                        },
                        "caching": "ReadWrite",
                        "createOption": "empty"
                    })
                })
                .collect();
            payload["properties"]["storageProfile"]["dataDisks"] = Value::Array(data_disks);
        }

        if let Some(availability_set) = &request.availability_set {
            let availability_set_id = self.client.resource_group_path(
                &request.resource_group,
                &format!("providers/Microsoft.Compute/availabilitySets/{}", availability_set),
            );
            payload["properties"]["availabilitySet"] = json!({ "id": availability_set_id });
        }

        let path = self.client.resource_group_path(
            &request.resource_group,
            &format!("providers/Microsoft.Compute/virtualMachines/{}", name),
        );
        let response = self
            .client
            .put(&path, payload, Some(COMPUTE_API_VERSION))
            .await?;
        let status = response.status.as_u16();
        let output = response.into_json("PUT", &path)?;
        reject_error_payload("PUT", &path, status, &output)?;

        let id = json_str(&output, &["id"]).ok_or_else(|| ArmError::malformed(&path, "created node without id"))?;

        Ok(Node::pending(ResourceHandle::from(id), name))
    }

    /// Power state read from the node's instance view.
    ///
    /// The second status entry carries the power state.
    pub async fn get_node_state(&self, node: &Node) -> Result<NodeState> {
        let raw = self
            .client
            .get_json(&node.id.child("InstanceView"), Some(COMPUTE_API_VERSION))
            .await?;

        let code = raw
            .get("statuses")
            .and_then(|v| v.as_array())
            .and_then(|statuses| statuses.get(1))
            .and_then(|status| json_str(status, &["code"]));

        Ok(NodeState::from_power_state(code))
    }

    /// Restart a node; refused when it is running or deallocated
    pub async fn reboot_node(&self, node: &Node) -> Result<bool> {
        match self.get_node_state(node).await? {
            NodeState::Running => {
                return Err(ArmError::Precondition("Node is already running".to_string()));
            },
            NodeState::Stopped => {
                return Err(ArmError::Precondition(
                    "Node has been deallocated, cannot be rebooted".to_string(),
                ));
            },
            _ => {},
        }

        tracing::info!("Rebooting node {}", node.id);

        let path = node.id.child("restart");
        self.client
            .post(&path, RequestBody::Empty, Some(RESTART_API_VERSION))
            .await?
            .error_for_status("POST", &path)?;

        Ok(true)
    }

    /// Delete a node; true when the API accepted the deletion
    pub async fn destroy_node(&self, node: &Node) -> Result<bool> {
        tracing::info!("Destroying node {}", node.id);

        let response = self
            .client
            .delete(node.id.as_str(), Some(COMPUTE_API_VERSION))
            .await?;

        if !response.is_success() {
            tracing::warn!("Destroying {} returned {}", node.id, response.status);
        }

        Ok(response.is_success())
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Walk the image catalog of one location, or of every location
    pub async fn list_images(&self, location: Option<&str>, publisher: Option<&str>) -> Result<Vec<Image>> {
        let locations = match location {
            Some(location) => vec![location.to_string()],
            None => self
                .list_locations()
                .await?
                .into_iter()
                .map(|l| l.name)
                .collect(),
        };

        let mut images = Vec::new();
        for location in &locations {
            images.extend(catalog::walk(&self.client, location, publisher).await?);
        }

        Ok(images)
    }

    // =========================================================================
    // Networking
    // =========================================================================

    pub async fn list_virtual_networks(&self) -> Result<Vec<VirtualNetwork>> {
        let path = self
            .client
            .subscription_path("providers/Microsoft.Network/virtualnetworks");
        let values = self.list_values(&path, Some(COMPUTE_API_VERSION)).await?;
        Ok(values.iter().map(VirtualNetwork::from).collect())
    }

    pub async fn list_subnets(&self, network: &ResourceHandle) -> Result<Vec<Subnet>> {
        let values = self
            .list_values(&network.child("subnets"), Some(COMPUTE_API_VERSION))
            .await?;
        Ok(values.iter().map(Subnet::from).collect())
    }

    /// Build a virtual network, fetching its subnets once
    pub async fn resolve_virtual_network(
        &self,
        id: &ResourceHandle,
        name: &str,
        location: &str,
    ) -> Result<VirtualNetwork> {
        let subnets = self.list_subnets(id).await?;
        Ok(VirtualNetwork::new(id.clone(), name, location, subnets))
    }

    fn public_ip_path(&self, node_name: &str, resource_group: &str) -> String {
        self.client.resource_group_path(
            resource_group,
            &format!("providers/Microsoft.Network/publicIPAddresses/{}-public-ip", node_name),
        )
    }

    /// Create a dynamic public IP named `{node}-public-ip`
    pub async fn create_public_ip(&self, node_name: &str, resource_group: &str, location: &Location) -> Result<Value> {
        let payload = json!({
            "location": location.id,
            "properties": {
                "publicIPAllocationMethod": "Dynamic",
                "publicIPAddressVersion": "IPv4",
                "idleTimeoutInMinutes": 5,
                "dnsSettings": {
                    "domainNameLabel": node_name
                }
            }
        });

        let path = self.public_ip_path(node_name, resource_group);

        tracing::info!("Creating public IP for {}", node_name);
        self.client.put(&path, payload, None).await?.into_json("PUT", &path)
    }

    /// Create the network interface `{node}-nic` on the configured subnet
    pub async fn create_network_interface(
        &self,
        node_name: &str,
        resource_group: &str,
        location: &Location,
        config: &NetworkConfig,
    ) -> Result<Value> {
        let mut ip_properties = json!({
            "subnet": {
                "id": config.subnet().id
            },
            "privateIPAllocationMethod": "Dynamic"
        });

        let public_ip = match config.public_ip() {
            PublicIpAllocation::None => None,
            PublicIpAllocation::Existing(handle) => Some(handle.to_string()),
            PublicIpAllocation::AllocateNew => {
                let pip = self.create_public_ip(node_name, resource_group, location).await?;
                let id = json_str(&pip, &["id"]).ok_or_else(|| {
                    ArmError::malformed(&self.public_ip_path(node_name, resource_group), "public IP without id")
                })?;
                Some(id.to_string())
            },
        };

        if let Some(public_ip) = public_ip {
            ip_properties["publicIPAddress"] = json!({ "id": public_ip });
        }

        let payload = json!({
            "location": location.id,
            "properties": {
                "ipConfigurations": [{
                    "name": format!("{}-ip", node_name),
                    "properties": ip_properties
                }]
            }
        });

        let path = self.client.resource_group_path(
            resource_group,
            &format!("providers/Microsoft.Network/networkInterfaces/{}-nic", node_name),
        );

        tracing::info!("Creating network interface for {}", node_name);
        self.client.put(&path, payload, None).await?.into_json("PUT", &path)
    }
}
