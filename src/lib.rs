//! armctl - Azure Resource Manager compute client
//!
//! Creates, lists, reboots and destroys virtual machines through the ARM
//! REST API, resolving the network interfaces and public IPs they link to.

pub mod azure;
pub mod compute;
pub mod config;

/// Version injected at compile time via ARMCTL_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("ARMCTL_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
