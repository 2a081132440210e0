//! # hotspot-core
//!
//! Keeps a single WiFi radio connected upstream while it hosts a NAT'd
//! access point on a virtual AP interface.
//!
//! ## Features
//!
//! - Client interface and radio detection via sysfs and `iw`
//! - Virtual AP interface creation with alternate names
//! - NetworkManager / connman / wpa_supplicant exclusion
//! - hostapd startup with feature and channel fallback
//! - dnsmasq DHCP and iptables NAT
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hotspot_core::{ConfigStore, Hotspot, HotspotPaths, RealSystemOps};
//!
//! # fn main() -> anyhow::Result<()> {
//! let paths = HotspotPaths::from_env();
//! let store = ConfigStore::open(paths.config_file.clone())?;
//! let mut hotspot = Hotspot::new(Arc::new(RealSystemOps), paths, store.config().clone());
//! hotspot.start()?;
//! hotspot.refresh_status();
//! hotspot.stop();
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod bounded;
pub mod cancel;
pub mod confgen;
pub mod config;
pub mod deps;
pub mod dhcp;
pub mod error;
pub mod exec;
pub mod leases;
pub mod nat;
pub mod network;
pub mod nm;
pub mod orchestrator;
pub mod paths;
pub mod probe;
pub mod process;
pub mod regulatory;
pub mod state;
pub mod supervisor;
pub mod vif;

#[cfg(test)]
mod testing;

pub use bounded::BoundedList;
pub use cancel::{new_flag, CancelFlag};
pub use confgen::{Band, FeatureLevel};
pub use config::{ConfigField, ConfigStore, HotspotConfig};
pub use deps::{DependencyReport, Tool, ToolStatus};
pub use error::{ConfigError, HotspotError, Result};
pub use exec::{CommandOutput, CommandSpec, ProcessSignal, RealSystemOps, SystemOps};
pub use leases::ConnectedClient;
pub use orchestrator::Hotspot;
pub use paths::HotspotPaths;
pub use probe::WifiClientInterface;
pub use state::{format_uptime, HotspotStatus, LifecycleState};
pub use supervisor::Phase;

/// Whether the process runs with effective uid 0.
pub fn check_privileges() -> bool {
    nix::unistd::Uid::effective().is_root()
}
