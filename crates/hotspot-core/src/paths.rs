use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_RUNTIME_DIR: &str = "/tmp";
pub const DEFAULT_NM_CONF_DIR: &str = "/etc/NetworkManager/conf.d";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hotspot-enabler/hotspot.conf";
pub const DEFAULT_SYSFS_NET: &str = "/sys/class/net";
pub const NM_DROPIN_NAME: &str = "hotspot-enabler-unmanaged.conf";

/// Every fixed filesystem location the hotspot touches.
#[derive(Debug, Clone)]
pub struct HotspotPaths {
    pub hostapd_conf: PathBuf,
    pub hostapd_log: PathBuf,
    pub dnsmasq_conf: PathBuf,
    pub dnsmasq_leases: PathBuf,
    pub dnsmasq_pid: PathBuf,
    pub dnsmasq_log: PathBuf,
    pub nm_dropin: PathBuf,
    pub config_file: PathBuf,
    pub sysfs_net: PathBuf,
}

impl Default for HotspotPaths {
    fn default() -> Self {
        Self::with_dirs(
            Path::new(DEFAULT_RUNTIME_DIR),
            Path::new(DEFAULT_NM_CONF_DIR),
            PathBuf::from(DEFAULT_CONFIG_PATH),
            PathBuf::from(DEFAULT_SYSFS_NET),
        )
    }
}

impl HotspotPaths {
    pub fn with_dirs(
        runtime_dir: &Path,
        nm_conf_dir: &Path,
        config_file: PathBuf,
        sysfs_net: PathBuf,
    ) -> Self {
        Self {
            hostapd_conf: runtime_dir.join("hotspot_enabler_hostapd.conf"),
            hostapd_log: runtime_dir.join("hotspot_enabler_hostapd.log"),
            dnsmasq_conf: runtime_dir.join("hotspot_enabler_dnsmasq.conf"),
            dnsmasq_leases: runtime_dir.join("hotspot_enabler_dnsmasq.leases"),
            dnsmasq_pid: runtime_dir.join("hotspot_enabler_dnsmasq.pid"),
            dnsmasq_log: runtime_dir.join("hotspot_enabler_dnsmasq.log"),
            nm_dropin: nm_conf_dir.join(NM_DROPIN_NAME),
            config_file,
            sysfs_net,
        }
    }

    /// Everything under one directory; used by tests and sandboxed runs.
    pub fn rooted_at(root: &Path) -> Self {
        Self::with_dirs(
            &root.join("run"),
            &root.join("nm"),
            root.join("hotspot.conf"),
            root.join("sys"),
        )
    }

    pub fn from_env() -> Self {
        let runtime_dir = env_path("HOTSPOT_RUNTIME_DIR", DEFAULT_RUNTIME_DIR);
        let nm_conf_dir = env_path("HOTSPOT_NM_CONF_DIR", DEFAULT_NM_CONF_DIR);
        let config_file = env_path("HOTSPOT_CONFIG", DEFAULT_CONFIG_PATH);
        let sysfs_net = env_path("HOTSPOT_SYSFS_NET", DEFAULT_SYSFS_NET);
        Self::with_dirs(&runtime_dir, &nm_conf_dir, config_file, sysfs_net)
    }

    pub fn with_runtime_dir(self, runtime_dir: &Path) -> Self {
        let nm_dir = self
            .nm_dropin
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_NM_CONF_DIR));
        Self::with_dirs(runtime_dir, &nm_dir, self.config_file, self.sysfs_net)
    }

    pub fn with_config_file(mut self, config_file: PathBuf) -> Self {
        self.config_file = config_file;
        self
    }

    /// Temporary artefacts removed by cleanup. The drop-in is handled by
    /// the network-manager exclusion, the user config is never removed.
    pub fn generated_files(&self) -> [&Path; 6] {
        [
            &self.hostapd_conf,
            &self.dnsmasq_conf,
            &self.dnsmasq_leases,
            &self.hostapd_log,
            &self.dnsmasq_pid,
            &self.dnsmasq_log,
        ]
    }

    pub fn interface_dir(&self, iface: &str) -> PathBuf {
        self.sysfs_net.join(iface)
    }

    pub fn interface_exists(&self, iface: &str) -> bool {
        !iface.is_empty() && self.interface_dir(iface).exists()
    }

    pub fn runtime_dir(&self) -> Option<&Path> {
        self.hostapd_conf.parent()
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
