//! Network-manager exclusion for the AP interface.
//!
//! The host may run NetworkManager, connman, a bare wpa_supplicant, or none
//! of them. Every stack is attempted and a missing tool is skipped.

use std::fs;
use std::io;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::exec::{CommandSpec, SystemOps};
use crate::paths::HotspotPaths;

const RELOAD_SETTLE: Duration = Duration::from_millis(500);
const PREREGISTER_SETTLE: Duration = Duration::from_millis(300);
const RELEASE_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerStack {
    NetworkManager,
    Connman,
    Supplicant,
}

impl ManagerStack {
    pub const ALL: [ManagerStack; 3] = [
        ManagerStack::NetworkManager,
        ManagerStack::Connman,
        ManagerStack::Supplicant,
    ];

    pub fn tool(self) -> &'static str {
        match self {
            ManagerStack::NetworkManager => "nmcli",
            ManagerStack::Connman => "connmanctl",
            ManagerStack::Supplicant => "wpa_cli",
        }
    }

    fn release_commands(self, iface: &str) -> Vec<CommandSpec> {
        match self {
            ManagerStack::NetworkManager => vec![CommandSpec::new("nmcli")
                .args(["device", "set", iface, "managed", "no"])],
            ManagerStack::Connman => {
                vec![CommandSpec::new("connmanctl").args(["disable", "wifi", iface])]
            }
            ManagerStack::Supplicant => vec![
                CommandSpec::new("wpa_cli").args(["-i", iface, "disconnect"]),
                CommandSpec::new("wpa_cli").args(["-i", iface, "terminate"]),
            ],
        }
    }
}

pub fn dropin_contents(iface: &str) -> String {
    format!("[keyfile]\nunmanaged-devices=interface-name:{iface}\n")
}

pub struct NetworkManagerExclusion<'a> {
    ops: &'a dyn SystemOps,
    paths: &'a HotspotPaths,
}

impl<'a> NetworkManagerExclusion<'a> {
    pub fn new(ops: &'a dyn SystemOps, paths: &'a HotspotPaths) -> Self {
        Self { ops, paths }
    }

    /// Writes the drop-in and reloads NetworkManager before the interface
    /// exists, so it never tries to manage it.
    pub fn preregister(&self, iface: &str) {
        if self.write_dropin(iface) {
            self.reload();
            self.ops.sleep(PREREGISTER_SETTLE);
        }
    }

    pub fn exclude(&self, iface: &str) {
        info!("Releasing {iface} from network managers");
        if self.write_dropin(iface) {
            self.reload();
            self.ops.sleep(RELOAD_SETTLE);
        }
        for stack in ManagerStack::ALL {
            self.release(stack, iface);
        }
        self.ops.sleep(RELEASE_SETTLE);
    }

    /// Lighter re-assertion before each hostapd attempt.
    pub fn reassert(&self, iface: &str) {
        self.release(ManagerStack::NetworkManager, iface);
    }

    /// Detaches a supplicant that auto-attached to the interface.
    pub fn detach_supplicant(&self, iface: &str) {
        self.release(ManagerStack::Supplicant, iface);
    }

    /// Safe when nothing was excluded.
    pub fn restore(&self) {
        match fs::remove_file(&self.paths.nm_dropin) {
            Ok(()) => debug!("Removed {}", self.paths.nm_dropin.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove {}: {}", self.paths.nm_dropin.display(), err),
        }
        self.reload();
    }

    fn release(&self, stack: ManagerStack, iface: &str) {
        if !self.ops.tool_available(stack.tool()) {
            debug!("{} not installed, skipping", stack.tool());
            return;
        }
        for cmd in stack.release_commands(iface) {
            let status = self.ops.run_silent(&cmd);
            if status != 0 {
                debug!("{cmd} exited {status}");
            }
        }
    }

    fn reload(&self) {
        if self.ops.tool_available("nmcli") {
            self.ops
                .run_silent(&CommandSpec::new("nmcli").args(["general", "reload", "conf"]));
        }
    }

    fn write_dropin(&self, iface: &str) -> bool {
        let path = &self.paths.nm_dropin;
        let Some(dir) = path.parent() else {
            return false;
        };
        // No NetworkManager config dir means no NetworkManager to tell.
        if !dir.is_dir() {
            debug!("{} absent, skipping drop-in", dir.display());
            return false;
        }
        match fs::write(path, dropin_contents(iface)) {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to write {}: {}", path.display(), err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSystemOps;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, HotspotPaths) {
        let tmp = TempDir::new().unwrap();
        let paths = HotspotPaths::rooted_at(tmp.path());
        fs::create_dir_all(paths.nm_dropin.parent().unwrap()).unwrap();
        (tmp, paths)
    }

    #[test]
    fn exclude_writes_dropin_and_releases_every_stack() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        NetworkManagerExclusion::new(&ops, &paths).exclude("ap0");

        assert_eq!(
            fs::read_to_string(&paths.nm_dropin).unwrap(),
            "[keyfile]\nunmanaged-devices=interface-name:ap0\n"
        );
        assert!(ops.ran("nmcli general reload conf"));
        assert!(ops.ran("nmcli device set ap0 managed no"));
        assert!(ops.ran("connmanctl disable wifi ap0"));
        assert!(ops.ran("wpa_cli -i ap0 disconnect"));
        assert!(ops.ran("wpa_cli -i ap0 terminate"));
        assert!(ops.total_sleep() >= RELOAD_SETTLE + RELEASE_SETTLE);
    }

    #[test]
    fn missing_managers_are_skipped() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        ops.set_missing("connmanctl");
        ops.set_missing("nmcli");
        NetworkManagerExclusion::new(&ops, &paths).exclude("ap0");
        assert!(ops.calls_starting_with("connmanctl").is_empty());
        assert!(ops.calls_starting_with("nmcli").is_empty());
        assert!(ops.ran("wpa_cli -i ap0 terminate"));
    }

    #[test]
    fn restore_without_exclude_is_harmless() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        let nm = NetworkManagerExclusion::new(&ops, &paths);
        nm.restore();
        nm.restore();
        assert!(!paths.nm_dropin.exists());
    }

    #[test]
    fn restore_removes_dropin() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        let nm = NetworkManagerExclusion::new(&ops, &paths);
        nm.preregister("hsap0");
        assert!(paths.nm_dropin.exists());
        nm.restore();
        assert!(!paths.nm_dropin.exists());
    }
}
