//! Azure Resource Manager plumbing
//!
//! This module provides the request/transport layer shared by every compute
//! operation: request construction, the HTTP transport, and the client that
//! follows redirects and retries rate-limited calls.
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer token and default subscription discovery
//! - [`client`] - Main ARM client with redirect-following and rate-limit retries
//! - [`error`] - Error types, including the transport classification
//! - [`http`] - Transport trait and the reqwest-backed implementation
//! - [`request`] - Versioned, escaped request construction
//!
//! # Example
//!
//! ```ignore
//! use armctl::azure::{auth::Credentials, client::ArmClient};
//! use armctl::config::ClientConfig;
//!
//! async fn example() -> armctl::azure::error::Result<()> {
//!     let creds = Credentials::new("token");
//!     let client = ArmClient::new("subscription-id", &creds, ClientConfig::default())?;
//!     let locations = client.get_json(&client.subscription_path("locations"), None).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod request;

#[cfg(test)]
pub(crate) mod mock;

pub use client::ArmClient;
pub use error::{ArmError, Result, TransportError};
