//! Marketplace catalog walk
//!
//! Images are listed publisher → offer → sku → version, each level a flat
//! listing keyed by the parent's resource reference. Every version leaf
//! needs one more fetch to learn its operating system.

use super::image::Image;
use super::json_str;
use super::node::ResourceHandle;
use crate::azure::client::ArmClient;
use crate::azure::error::{ArmError, Result};
use serde::Serialize;
use serde_json::Value;

/// API version of the catalog endpoints
pub const CATALOG_API_VERSION: &str = "2016-03-30";

/// One entry of a catalog listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub id: ResourceHandle,
}

impl CatalogEntry {
    /// Case-insensitive match against the id or the display name
    pub fn matches(&self, filter: &str) -> bool {
        self.id.as_str().eq_ignore_ascii_case(filter) || self.name.eq_ignore_ascii_case(filter)
    }
}

/// Fetch one catalog level; the body is a JSON array of `{name, id}`
async fn list_entries(client: &ArmClient, path: &str) -> Result<Vec<CatalogEntry>> {
    let raw = client.get_json(path, Some(CATALOG_API_VERSION)).await?;

    let Value::Array(items) = raw else {
        return Err(ArmError::malformed(path, "expected a JSON array"));
    };

    items
        .iter()
        .map(|item| {
            let (Some(name), Some(id)) = (json_str(item, &["name"]), json_str(item, &["id"])) else {
                return Err(ArmError::malformed(path, "catalog entry without name or id"));
            };
            Ok(CatalogEntry {
                name: name.to_string(),
                id: ResourceHandle::from(id),
            })
        })
        .collect()
}

/// Publishers offering images in `location`
pub async fn list_publishers(client: &ArmClient, location: &str) -> Result<Vec<CatalogEntry>> {
    let path = client.subscription_path(&format!(
        "providers/Microsoft.Compute/locations/{}/publishers",
        location
    ));
    list_entries(client, &path).await
}

pub async fn list_offers(client: &ArmClient, publisher: &ResourceHandle) -> Result<Vec<CatalogEntry>> {
    list_entries(client, &publisher.child("artifacttypes/vmimage/offers")).await
}

pub async fn list_skus(client: &ArmClient, offer: &ResourceHandle) -> Result<Vec<CatalogEntry>> {
    list_entries(client, &offer.child("skus")).await
}

pub async fn list_versions(client: &ArmClient, sku: &ResourceHandle) -> Result<Vec<CatalogEntry>> {
    list_entries(client, &sku.child("versions")).await
}

/// Operating system of an image version
pub async fn image_os(client: &ArmClient, version: &ResourceHandle) -> Result<String> {
    let raw = client
        .get_json(version.as_str(), Some(CATALOG_API_VERSION))
        .await?;

    json_str(&raw, &["properties", "osDiskImage", "operatingSystem"])
        .map(|s| s.to_string())
        .ok_or_else(|| ArmError::malformed(version.as_str(), "missing properties.osDiskImage.operatingSystem"))
}

/// Enumerate every image leaf in `location`, optionally for one publisher.
///
/// Output follows publisher, offer, sku, version order, each level in the
/// order the API lists it.
pub async fn walk(client: &ArmClient, location: &str, publisher: Option<&str>) -> Result<Vec<Image>> {
    let mut images = Vec::new();

    let mut publishers = list_publishers(client, location).await?;
    if let Some(filter) = publisher {
        publishers.retain(|p| p.matches(filter));
    }

    tracing::debug!("Walking catalog of {} publishers in {}", publishers.len(), location);

    for publisher in &publishers {
        for offer in list_offers(client, &publisher.id).await? {
            for sku in list_skus(client, &offer.id).await? {
                for version in list_versions(client, &sku.id).await? {
                    let os = image_os(client, &version.id).await?;
                    images.push(Image::new(
                        &publisher.name,
                        &offer.name,
                        &sku.name,
                        &os,
                        &version.name,
                        location,
                    ));
                }
            }
        }
    }

    Ok(images)
}
