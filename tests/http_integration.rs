//! Integration tests for the ARM client using wiremock
//!
//! These tests run the real reqwest transport against mocked endpoints,
//! covering link resolution, the catalog walk, rate-limit retries,
//! redirects and the node lifecycle.

use armctl::azure::auth::Credentials;
use armctl::azure::client::ArmClient;
use armctl::azure::error::ArmError;
use armctl::compute::{
    ArmNodeDriver, CreateNode, Image, Location, NetworkConfig, Node, NodeState, OsDisk, PublicIpAllocation,
    ResourceHandle, Size, Subnet, VirtualNetwork,
};
use armctl::config::ClientConfig;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{bearer_token, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUB: &str = "sub-1";

fn driver_for(server: &MockServer) -> ArmNodeDriver {
    let config = ClientConfig::for_endpoint("http", &server.address().to_string());
    let client = ArmClient::new(SUB, &Credentials::new("test-token"), config).expect("client should build");
    ArmNodeDriver::new(client)
}

fn rg(group: &str, rest: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}/providers/{}", SUB, group, rest)
}

/// Test module for address resolution through linked resources
mod resolution_tests {
    use super::*;

    /// Test node listing resolves NIC and public IP references
    #[tokio::test]
    async fn test_list_nodes_resolves_addresses() {
        let server = MockServer::start().await;
        let nic = rg("myapp", "Microsoft.Network/networkInterfaces/nic1");
        let pip = rg("myapp", "Microsoft.Network/publicIPAddresses/pip1");

        Mock::given(method("GET"))
            .and(path(rg("myapp", "Microsoft.Compute/virtualMachines")))
            .and(query_param("api-version", "2016-03-30"))
            .and(bearer_token("test-token"))
            .and(header_exists("x-ms-client-request-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "id": rg("myapp", "Microsoft.Compute/virtualMachines/vm1"),
                    "name": "vm1",
                    "location": "westeurope",
                    "properties": {
                        "provisioningState": "Succeeded",
                        "hardwareProfile": {"vmSize": "Standard_A1"},
                        "networkProfile": {"networkInterfaces": [{"id": nic}]}
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(nic.as_str()))
            .and(query_param("api-version", "2016-07-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {"ipConfigurations": [{
                    "properties": {
                        "privateIPAddress": "10.1.1.1",
                        "publicIPAddress": {"id": pip}
                    }
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(pip.as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"properties": {"ipAddress": "1.1.1.1"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let nodes = driver_for(&server).list_nodes(Some("myapp")).await.unwrap();

        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.name, "vm1");
        assert_eq!(node.state, NodeState::Running);
        assert_eq!(node.public_ips, vec!["1.1.1.1"]);
        assert_eq!(node.private_ips, vec!["10.1.1.1"]);
        assert_eq!(node.extra["provisioningState"], "Succeeded");
        assert_eq!(node.extra["vmSize"], "Standard_A1");
    }

    /// Test addresses follow interface order
    #[tokio::test]
    async fn test_two_interfaces_keep_order() {
        let server = MockServer::start().await;
        let nic_a = rg("myapp", "Microsoft.Network/networkInterfaces/nic-a");
        let nic_b = rg("myapp", "Microsoft.Network/networkInterfaces/nic-b");

        Mock::given(method("GET"))
            .and(path(rg("myapp", "Microsoft.Compute/virtualMachines/vm1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": rg("myapp", "Microsoft.Compute/virtualMachines/vm1"),
                "name": "vm1",
                "properties": {
                    "provisioningState": "Creating",
                    "networkProfile": {"networkInterfaces": [{"id": nic_a}, {"id": nic_b}]}
                }
            })))
            .mount(&server)
            .await;

        for (nic, ip) in [(&nic_a, "10.0.0.4"), (&nic_b, "10.0.1.4")] {
            Mock::given(method("GET"))
                .and(path(nic.as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "properties": {"ipConfigurations": [{"properties": {"privateIPAddress": ip}}]}
                })))
                .mount(&server)
                .await;
        }

        let node = driver_for(&server)
            .get_node(&ResourceHandle::new(rg("myapp", "Microsoft.Compute/virtualMachines/vm1")))
            .await
            .unwrap();

        assert_eq!(node.private_ips, vec!["10.0.0.4", "10.0.1.4"]);
        assert!(node.public_ips.is_empty());
        assert_eq!(node.state, NodeState::Pending);
    }

    /// Test a missing resource group surfaces the API error message
    #[tokio::test]
    async fn test_missing_resource_group_error_message() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(rg("fakegroup", "Microsoft.Compute/virtualMachines")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "ResourceGroupNotFound",
                    "message": "Resource group 'fakegroup' could not be found."
                }
            })))
            .mount(&server)
            .await;

        let err = driver_for(&server).list_nodes(Some("fakegroup")).await.unwrap_err();

        match err {
            ArmError::Remote { status, message, .. } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Resource group 'fakegroup' could not be found.");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

/// Test module for the marketplace catalog walk
mod catalog_tests {
    use super::*;

    /// Test a single-leaf catalog yields one image
    #[tokio::test]
    async fn test_single_leaf_catalog() {
        let server = MockServer::start().await;
        let base = format!("/subscriptions/{}/providers/Microsoft.Compute/locations/loc", SUB);
        let publisher = format!("{}/publishers/p", base);
        let offer = format!("{}/artifacttypes/vmimage/offers/o", publisher);
        let sku = format!("{}/skus/s", offer);
        let version = format!("{}/versions/v", sku);

        let levels = [
            (format!("{}/publishers", base), "p", publisher.clone()),
            (format!("{}/artifacttypes/vmimage/offers", publisher), "o", offer.clone()),
            (format!("{}/skus", offer), "s", sku.clone()),
            (format!("{}/versions", sku), "v", version.clone()),
        ];

        for (listing, name, id) in &levels {
            Mock::given(method("GET"))
                .and(path(listing.as_str()))
                .and(query_param("api-version", "2016-03-30"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": name, "id": id}])))
                .expect(1)
                .mount(&server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path(version.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {"osDiskImage": {"operatingSystem": "os"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let images = driver_for(&server).list_images(Some("loc"), None).await.unwrap();

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id(), "p:o:s:os:v");
        assert_eq!(images[0].location, "loc");
    }
}

/// Test module for rate limiting and redirects
mod retry_tests {
    use super::*;

    fn locations_path() -> String {
        format!("/subscriptions/{}/locations", SUB)
    }

    /// Test a rate-limited call is retried after the advertised delay
    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(locations_path()))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(locations_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": [{"name": "westus", "displayName": "West US"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let started = Instant::now();
        let locations = driver_for(&server).list_locations().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].display_name, "West US");
    }

    /// Test the retry budget is bounded: one attempt plus five retries
    #[tokio::test]
    async fn test_rate_limit_retries_exhausted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(locations_path()))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(6)
            .mount(&server)
            .await;

        let err = driver_for(&server).list_locations().await.unwrap_err();

        assert!(matches!(err, ArmError::RetriesExhausted { max_retries: 5, .. }));
    }

    /// Test a rate limit without Retry-After fails immediately
    #[tokio::test]
    async fn test_rate_limit_without_delay_fails() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(locations_path()))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = driver_for(&server).list_locations().await.unwrap_err();

        assert!(matches!(err, ArmError::RateLimited { .. }));
        assert_eq!(err.status(), Some(429));
    }

    /// Test a redirect moves the request to the new host
    #[tokio::test]
    async fn test_redirect_to_other_host() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(locations_path()))
            .respond_with(
                ResponseTemplate::new(307)
                    .insert_header("Location", format!("{}{}", second.uri(), locations_path()).as_str()),
            )
            .expect(1)
            .mount(&first)
            .await;

        Mock::given(method("GET"))
            .and(path(locations_path()))
            .and(query_param("api-version", "2016-07-01"))
            .and(bearer_token("test-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "eastus"}]})),
            )
            .expect(1)
            .mount(&second)
            .await;

        let locations = driver_for(&first).list_locations().await.unwrap();

        assert_eq!(locations[0].name, "eastus");
    }
}

/// Test module for the node lifecycle
mod lifecycle_tests {
    use super::*;

    fn vnet_id() -> String {
        rg("rg1", "Microsoft.Network/virtualNetworks/vnet1")
    }

    fn network_config() -> NetworkConfig {
        let subnet = Subnet::new(format!("{}/subnets/default", vnet_id()), "default");
        let vnet = VirtualNetwork::new(vnet_id(), "vnet1", "westeurope", vec![subnet.clone()]);
        NetworkConfig::new(vnet, subnet, PublicIpAllocation::AllocateNew).unwrap()
    }

    fn request(resource_group: &str) -> CreateNode {
        CreateNode::new(
            "vm1",
            Location::new("westeurope"),
            Size::new("Standard_A1"),
            resource_group,
            Image::new("Canonical", "UbuntuServer", "16.04-LTS", "Linux", "latest", "westeurope"),
            "azureuser",
            OsDisk {
                account: "storage1".to_string(),
                size_gb: 30,
            },
        )
        .network_config(network_config())
    }

    /// Test node creation issues public IP, NIC and VM calls
    #[tokio::test]
    async fn test_create_node() {
        let server = MockServer::start().await;
        let pip = rg("rg1", "Microsoft.Network/publicIPAddresses/vm1-public-ip");
        let nic = rg("rg1", "Microsoft.Network/networkInterfaces/vm1-nic");
        let vm = rg("rg1", "Microsoft.Compute/virtualMachines/vm1");

        Mock::given(method("PUT"))
            .and(path(pip.as_str()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": pip})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path(nic.as_str()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": nic})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path(vm.as_str()))
            .and(query_param("api-version", "2016-03-30"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": vm, "name": "vm1"})))
            .expect(1)
            .mount(&server)
            .await;

        let node = driver_for(&server).create_node(&request("rg1")).await.unwrap();

        assert_eq!(node.id.as_str(), vm);
        assert_eq!(node.state, NodeState::Pending);
        assert!(node.public_ips.is_empty());
    }

    /// Test a mismatched resource group is rejected before any request
    #[tokio::test]
    async fn test_create_node_resource_group_mismatch() {
        let server = MockServer::start().await;

        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let err = driver_for(&server).create_node(&request("rg2")).await.unwrap_err();

        assert!(matches!(err, ArmError::Validation(_)));
    }

    fn node() -> Node {
        Node::pending(ResourceHandle::new(rg("rg1", "Microsoft.Compute/virtualMachines/vm1")), "vm1")
    }

    async fn mount_power_state(server: &MockServer, code: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{}/InstanceView", node().id)))
            .and(query_param("api-version", "2016-03-30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statuses": [{"code": "ProvisioningState/succeeded"}, {"code": code}]
            })))
            .mount(server)
            .await;
    }

    /// Test reboot is refused for a running node
    #[tokio::test]
    async fn test_reboot_running_node_refused() {
        let server = MockServer::start().await;
        mount_power_state(&server, "PowerState/running").await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = driver_for(&server).reboot_node(&node()).await.unwrap_err();

        assert!(matches!(err, ArmError::Precondition(ref msg) if msg == "Node is already running"));
    }

    /// Test reboot of a stopped node posts the restart action
    #[tokio::test]
    async fn test_reboot_stopped_node() {
        let server = MockServer::start().await;
        mount_power_state(&server, "PowerState/stopped").await;

        Mock::given(method("POST"))
            .and(path(format!("{}/restart", node().id)))
            .and(query_param("api-version", "2015-06-15"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(driver_for(&server).reboot_node(&node()).await.unwrap());
    }

    /// Test destroy reports whether the deletion was accepted
    #[tokio::test]
    async fn test_destroy_node() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(node().id.as_str()))
            .and(query_param("api-version", "2016-03-30"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        assert!(driver_for(&server).destroy_node(&node()).await.unwrap());
    }
}
