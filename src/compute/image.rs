//! Marketplace images

use crate::azure::error::{ArmError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// A marketplace image, identified by five coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub os: String,
    pub version: String,
    pub location: String,
}

impl Image {
    pub fn new(publisher: &str, offer: &str, sku: &str, os: &str, version: &str, location: &str) -> Self {
        Self {
            publisher: publisher.to_string(),
            offer: offer.to_string(),
            sku: sku.to_string(),
            os: os.to_string(),
            version: version.to_string(),
            location: location.to_string(),
        }
    }

    /// Rebuild an image from its `publisher:offer:sku:os:version` id
    pub fn from_urn(urn: &str, location: &str) -> Result<Self> {
        let parts: Vec<&str> = urn.split(':').collect();

        match parts.as_slice() {
            [publisher, offer, sku, os, version] if parts.iter().all(|p| !p.is_empty()) => {
                Ok(Self::new(publisher, offer, sku, os, version, location))
            },
            _ => Err(ArmError::Validation(format!(
                "Invalid image URN '{}': expected publisher:offer:sku:os:version",
                urn
            ))),
        }
    }

    /// Composite id `publisher:offer:sku:os:version`
    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.publisher, self.offer, self.sku, self.os, self.version
        )
    }

    pub fn name(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.publisher, self.offer, self.sku, self.os, self.version
        )
    }

    /// Image reference used in a VM storage profile
    pub fn image_reference(&self) -> Value {
        json!({
            "publisher": self.publisher,
            "offer": self.offer,
            "sku": self.sku,
            "version": self.version,
        })
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_and_name() {
        let image = Image::new("Canonical", "UbuntuServer", "16.04-LTS", "Linux", "16.04.201611150", "westeurope");
        assert_eq!(image.id(), "Canonical:UbuntuServer:16.04-LTS:Linux:16.04.201611150");
        assert_eq!(image.name(), "Canonical UbuntuServer 16.04-LTS Linux 16.04.201611150");
        assert_eq!(
            image.image_reference(),
            json!({"publisher": "Canonical", "offer": "UbuntuServer", "sku": "16.04-LTS", "version": "16.04.201611150"})
        );
    }

    #[test]
    fn test_from_urn_reconstructs_id() {
        let urn = "MicrosoftWindowsServer:WindowsServer:2012-R2-Datacenter:Windows:4.0.20161012";
        let image = Image::from_urn(urn, "eastus").unwrap();
        assert_eq!(image.id(), urn);
        assert_eq!(image.sku, "2012-R2-Datacenter");
        assert_eq!(image.location, "eastus");
    }

    #[test]
    fn test_from_urn_rejects_malformed() {
        assert!(Image::from_urn("a:b:c:d", "x").is_err());
        assert!(Image::from_urn("a:b:c:d:e:f", "x").is_err());
        assert!(Image::from_urn("a::c:d:e", "x").is_err());
    }
}
