//! Network probe: client interface detection, link refresh, AP/STA
//! capability and radio lookup.

use std::fs;
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::debug;

use crate::exec::{CommandSpec, SystemOps};
use crate::paths::HotspotPaths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WifiClientInterface {
    pub name: String,
    pub phy: Option<String>,
    pub ssid: Option<String>,
    pub ip: Option<Ipv4Addr>,
    pub mac: Option<String>,
    /// 0 when unknown
    pub channel: u32,
    pub signal_dbm: Option<i32>,
    pub connected: bool,
    pub supports_ap: bool,
}

impl WifiClientInterface {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// First wireless interface in sysfs (sorted by name) that is not one of
/// `exclude`.
pub fn detect_client_interface(paths: &HotspotPaths, exclude: &[&str]) -> Option<String> {
    let entries = match fs::read_dir(&paths.sysfs_net) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Cannot scan {}: {}", paths.sysfs_net.display(), err);
            return None;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();

    names.into_iter().find(|name| {
        if exclude.contains(&name.as_str()) {
            return false;
        }
        let dir = paths.interface_dir(name);
        dir.join("wireless").exists() || dir.join("phy80211").exists()
    })
}

/// Physical radio handle backing `iface` (e.g. `phy0`).
pub fn radio_for(paths: &HotspotPaths, iface: &str) -> Option<String> {
    let path = paths.interface_dir(iface).join("phy80211").join("name");
    fs::read_to_string(&path)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Re-reads link facts in place. Fields whose source is unavailable keep
/// their previous values.
pub fn refresh(ops: &dyn SystemOps, paths: &HotspotPaths, iface: &mut WifiClientInterface) {
    let link = ops.run_capturing(&CommandSpec::new("iw").args(["dev", &iface.name, "link"]));
    if link.success() {
        match field_after(&link.stdout, "SSID:") {
            Some(ssid) => {
                iface.ssid = Some(ssid.to_string());
                iface.connected = true;
            }
            None => {
                iface.ssid = None;
                iface.connected = false;
            }
        }
        if let Some(signal) = field_after(&link.stdout, "signal:").and_then(leading_int) {
            iface.signal_dbm = Some(signal);
        }
    }

    let addr = ops.run_capturing(
        &CommandSpec::new("ip").args(["-4", "-o", "addr", "show", "dev", &iface.name]),
    );
    if addr.success() {
        if let Some(ip) = parse_inet(&addr.stdout) {
            iface.ip = Some(ip);
        }
    }

    if let Ok(mac) = fs::read_to_string(paths.interface_dir(&iface.name).join("address")) {
        let mac = mac.trim();
        if !mac.is_empty() {
            iface.mac = Some(mac.to_string());
        }
    }

    let info = ops.run_capturing(&CommandSpec::new("iw").args(["dev", &iface.name, "info"]));
    if info.success() {
        iface.channel = parse_channel(&info.stdout).unwrap_or(0);
    }
}

/// Detects and fully probes the client interface, including its radio and
/// AP/STA capability.
pub fn probe_client(
    ops: &dyn SystemOps,
    paths: &HotspotPaths,
    exclude: &[&str],
) -> Option<WifiClientInterface> {
    let name = detect_client_interface(paths, exclude)?;
    let mut iface = WifiClientInterface::named(name);
    refresh(ops, paths, &mut iface);
    iface.phy = radio_for(paths, &iface.name);
    if let Some(phy) = iface.phy.as_deref() {
        let info = ops.run_capturing(&CommandSpec::new("iw").args(["phy", phy, "info"]));
        iface.supports_ap = info.success() && check_ap_concurrency(&info.stdout);
    }
    Some(iface)
}

/// Advisory AP/STA concurrency verdict from `iw phy <phy> info` output.
pub fn check_ap_concurrency(phy_info: &str) -> bool {
    block_has_managed_and_ap(phy_info, "valid interface combinations:", 8)
        || block_has_managed_and_ap(phy_info, "Supported interface modes:", 10)
}

fn block_has_managed_and_ap(text: &str, header: &str, span: usize) -> bool {
    let lines: Vec<&str> = text.lines().collect();
    let Some(start) = lines.iter().position(|line| line.contains(header)) else {
        return false;
    };
    let end = (start + span + 1).min(lines.len());
    let block = lines[start..end].join("\n");
    block.contains("managed") && block.contains("AP")
}

fn field_after<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let rest = line.split_once(key)?.1.trim();
        (!rest.is_empty()).then_some(rest)
    })
}

fn leading_int(text: &str) -> Option<i32> {
    let end = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

fn parse_inet(text: &str) -> Option<Ipv4Addr> {
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "inet" {
            let cidr = tokens.next()?;
            return cidr.split('/').next()?.parse().ok();
        }
    }
    None
}

fn parse_channel(text: &str) -> Option<u32> {
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("channel ")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}
