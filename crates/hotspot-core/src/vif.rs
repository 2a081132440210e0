//! Virtual AP interface lifecycle on the client's radio.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{HotspotError, Result};
use crate::exec::{CommandSpec, SystemOps};
use crate::network::gateway_cidr;
use crate::nm::NetworkManagerExclusion;
use crate::paths::HotspotPaths;

/// Tried in order; the first that creates becomes the AP interface.
pub const AP_CANDIDATES: [&str; 4] = ["ap0", "ap1", "hsap0", "hsap1"];

const PREFLIGHT_SETTLE: Duration = Duration::from_millis(300);
const REMOVAL_SETTLE: Duration = Duration::from_millis(500);
const APPEAR_SETTLE: Duration = Duration::from_millis(500);
const ADDRESS_RETRY_SETTLE: Duration = Duration::from_millis(200);

pub struct VirtualInterfaceManager<'a> {
    ops: &'a dyn SystemOps,
    paths: &'a HotspotPaths,
}

impl<'a> VirtualInterfaceManager<'a> {
    pub fn new(ops: &'a dyn SystemOps, paths: &'a HotspotPaths) -> Self {
        Self { ops, paths }
    }

    /// Kills daemons left over from an earlier run of ours and unblocks WiFi.
    pub fn preflight(&self) {
        for conf in [&self.paths.hostapd_conf, &self.paths.dnsmasq_conf] {
            let pattern = conf.display().to_string();
            self.ops
                .run_silent(&CommandSpec::new("pkill").args(["-f", pattern.as_str()]));
        }
        if self.ops.tool_available("rfkill") {
            self.ops
                .run_silent(&CommandSpec::new("rfkill").args(["unblock", "wifi"]));
        }
        self.ops.sleep(PREFLIGHT_SETTLE);
    }

    pub fn create(&self, phy: &str, client_iface: &str) -> Result<String> {
        self.preflight();
        let nm = NetworkManagerExclusion::new(self.ops, self.paths);
        let mut tried = Vec::with_capacity(AP_CANDIDATES.len());

        for candidate in AP_CANDIDATES {
            tried.push(candidate.to_string());
            if !self.force_remove(candidate) {
                warn!("Stale {candidate} could not be removed, trying next name");
                continue;
            }
            nm.preregister(candidate);

            if self.add_ap_interface(phy, client_iface, candidate) {
                self.ops.sleep(APPEAR_SETTLE);
                info!("Created AP interface {candidate} on {phy}");
                return Ok(candidate.to_string());
            }
            debug!("Creating {candidate} failed");
        }

        Err(HotspotError::InterfaceExhausted { tried })
    }

    /// Removes a same-named interface left by an earlier run. Returns false
    /// if it is still present afterwards.
    pub fn force_remove(&self, iface: &str) -> bool {
        if !self.paths.interface_exists(iface) {
            return true;
        }
        debug!("Removing stale interface {iface}");
        self.ops
            .run_silent(&CommandSpec::new("ip").args(["link", "set", iface, "down"]));
        self.ops
            .run_silent(&CommandSpec::new("ip").args(["addr", "flush", "dev", iface]));
        if self.ops.tool_available("wpa_cli") {
            self.ops
                .run_silent(&CommandSpec::new("wpa_cli").args(["-i", iface, "terminate"]));
        }
        if self.ops.tool_available("nmcli") {
            self.ops.run_silent(
                &CommandSpec::new("nmcli").args(["device", "set", iface, "managed", "no"]),
            );
        }
        self.delete(iface);
        self.ops.sleep(REMOVAL_SETTLE);
        !self.paths.interface_exists(iface)
    }

    /// Brings the interface up and assigns the gateway address. Failures are
    /// logged only: hostapd may already have a working setup.
    pub fn assign_address(&self, iface: &str) {
        let cidr = gateway_cidr().to_string();
        self.ops
            .run_silent(&CommandSpec::new("ip").args(["link", "set", iface, "up"]));
        self.ops
            .run_silent(&CommandSpec::new("ip").args(["addr", "flush", "dev", iface]));
        let added = self
            .ops
            .run_silent(&CommandSpec::new("ip").args(["addr", "add", cidr.as_str(), "dev", iface]));
        if added == 0 {
            info!("Assigned {cidr} to {iface}");
            return;
        }

        self.ops.sleep(ADDRESS_RETRY_SETTLE);
        let replaced = self.ops.run_silent(
            &CommandSpec::new("ip").args(["addr", "replace", cidr.as_str(), "dev", iface]),
        );
        if replaced == 0 {
            info!("Assigned {cidr} to {iface} (replace)");
        } else {
            warn!("Could not assign {cidr} to {iface} (exit {replaced})");
        }
    }

    /// Best effort; an absent interface is fine.
    pub fn destroy(&self, iface: &str) {
        if iface.is_empty() {
            return;
        }
        self.delete(iface);
    }

    fn delete(&self, iface: &str) {
        let status = self
            .ops
            .run_silent(&CommandSpec::new("iw").args(["dev", iface, "del"]));
        if status != 0 {
            debug!("iw dev {iface} del exited {status}");
        }
    }

    fn add_ap_interface(&self, phy: &str, client_iface: &str, name: &str) -> bool {
        let by_phy = CommandSpec::new("iw").args(["phy", phy, "interface", "add", name, "type", "__ap"]);
        if self.ops.run_silent(&by_phy) == 0 {
            return true;
        }
        let by_dev = CommandSpec::new("iw")
            .args(["dev", client_iface, "interface", "add", name, "type", "__ap"]);
        self.ops.run_silent(&by_dev) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::MockSystemOps;
    use std::fs;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, HotspotPaths) {
        let tmp = TempDir::new().unwrap();
        let paths = HotspotPaths::rooted_at(tmp.path());
        fs::create_dir_all(&paths.sysfs_net).unwrap();
        fs::create_dir_all(paths.nm_dropin.parent().unwrap()).unwrap();
        (tmp, paths)
    }

    #[test]
    fn first_candidate_wins() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        let name = VirtualInterfaceManager::new(&ops, &paths)
            .create("phy0", "wlan0")
            .unwrap();
        assert_eq!(name, "ap0");
        assert!(ops.ran("iw phy phy0 interface add ap0 type __ap"));
        assert!(ops.ran("rfkill unblock wifi"));
        let preflight = ops.position("pkill -f").unwrap();
        let add = ops.position("iw phy phy0 interface add").unwrap();
        assert!(preflight < add);
    }

    #[test]
    fn falls_back_to_alternate_names() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        ops.respond("iw phy phy0 interface add", CommandOutput::failed(161));
        ops.respond("iw dev wlan0 interface add ap0", CommandOutput::failed(161));
        ops.respond("iw dev wlan0 interface add ap1", CommandOutput::failed(161));

        let name = VirtualInterfaceManager::new(&ops, &paths)
            .create("phy0", "wlan0")
            .unwrap();
        assert_eq!(name, "hsap0");
        assert!(ops.ran("iw dev wlan0 interface add hsap0 type __ap"));
    }

    #[test]
    fn exhaustion_names_every_candidate() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        ops.respond("iw phy", CommandOutput::failed(95));
        ops.respond("iw dev wlan0 interface add", CommandOutput::failed(95));

        let err = VirtualInterfaceManager::new(&ops, &paths)
            .create("phy0", "wlan0")
            .unwrap_err();
        match err {
            HotspotError::InterfaceExhausted { tried } => assert_eq!(tried, AP_CANDIDATES),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stale_interface_is_removed_before_reuse() {
        let (_tmp, paths) = sandbox();
        let stale = paths.interface_dir("ap0");
        fs::create_dir_all(&stale).unwrap();
        let ops = MockSystemOps::new();
        ops.on("iw dev ap0 del", move |_| {
            let _ = fs::remove_dir_all(&stale);
            CommandOutput::ok("")
        });

        let name = VirtualInterfaceManager::new(&ops, &paths)
            .create("phy0", "wlan0")
            .unwrap();
        assert_eq!(name, "ap0");
        let del = ops.position("iw dev ap0 del").unwrap();
        assert!(ops.position("ip link set ap0 down").unwrap() < del);
        assert!(ops.position("nmcli device set ap0 managed no").unwrap() < del);
    }

    #[test]
    fn unremovable_stale_interface_is_skipped() {
        let (_tmp, paths) = sandbox();
        fs::create_dir_all(paths.interface_dir("ap0")).unwrap();
        let ops = MockSystemOps::new();
        let name = VirtualInterfaceManager::new(&ops, &paths)
            .create("phy0", "wlan0")
            .unwrap();
        assert_eq!(name, "ap1");
        assert!(!ops.ran("iw phy phy0 interface add ap0 type __ap"));
    }

    #[test]
    fn address_falls_back_to_replace() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        ops.respond("ip addr add", CommandOutput::failed(2));
        VirtualInterfaceManager::new(&ops, &paths).assign_address("ap0");
        assert!(ops.ran("ip link set ap0 up"));
        assert!(ops.ran("ip addr flush dev ap0"));
        assert!(ops.ran("ip addr add 192.168.12.1/24 dev ap0"));
        assert!(ops.ran("ip addr replace 192.168.12.1/24 dev ap0"));
    }
}
