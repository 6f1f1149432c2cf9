//! Compute domain
//!
//! Nodes (virtual machines) and everything needed to create and list them:
//! locations, sizes, marketplace images and virtual networks.
//!
//! # Module Structure
//!
//! - [`driver`] - Node lifecycle and listings over one subscription
//! - [`resolver`] - Address resolution through NIC and public IP references
//! - [`catalog`] - Publisher/offer/sku/version image catalog walk
//! - [`node`] - Node, state and resource handle types
//! - [`image`], [`location`], [`network`] - Value types

pub mod catalog;
pub mod driver;
pub mod image;
pub mod location;
pub mod network;
pub mod node;
pub mod resolver;

pub use driver::{ArmNodeDriver, CreateNode, DataDisk, OsDisk};
pub use image::Image;
pub use location::{Location, Size};
pub use network::{NetworkConfig, PublicIpAllocation, Subnet, VirtualNetwork};
pub use node::{Node, NodeState, ResourceHandle};

use serde_json::Value;

/// Follow `path` through nested objects and read a string leaf
pub(crate) fn json_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))?
        .as_str()
}
