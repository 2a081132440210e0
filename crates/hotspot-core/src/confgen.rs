//! hostapd and dnsmasq configuration rendering.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::config::HotspotConfig;
use crate::error::{HotspotError, Result};
use crate::network::{
    AP_DHCP_END, AP_DHCP_START, AP_GATEWAY, DHCP_LEASE_TIME, UPSTREAM_DNS,
};
use crate::paths::HotspotPaths;

/// Used when neither the config nor the client connection names a channel.
pub const DEFAULT_CHANNEL: u32 = 6;

/// Channels at or above this number are 5GHz.
pub const FIVE_GHZ_THRESHOLD: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
    #[serde(rename = "2.4GHz")]
    TwoPointFour,
    #[serde(rename = "5GHz")]
    Five,
}

impl Band {
    pub fn for_channel(channel: u32) -> Self {
        if channel < FIVE_GHZ_THRESHOLD {
            Band::TwoPointFour
        } else {
            Band::Five
        }
    }

    pub fn hw_mode(self) -> &'static str {
        match self {
            Band::TwoPointFour => "g",
            Band::Five => "a",
        }
    }

    pub fn is_5ghz(self) -> bool {
        self == Band::Five
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLevel {
    /// 802.11n (and 802.11ac on 5GHz) with WMM
    Full,
    /// No high-throughput extensions
    Minimal,
}

/// Explicit channel, else the client's current channel, else [`DEFAULT_CHANNEL`].
pub fn resolve_channel(requested: u32, client_channel: u32) -> u32 {
    match (requested, client_channel) {
        (0, 0) => DEFAULT_CHANNEL,
        (0, client) => client,
        (explicit, _) => explicit,
    }
}

/// Everything that varies between hostapd attempts.
#[derive(Debug, Clone)]
pub struct ApSettings<'a> {
    pub ap_iface: &'a str,
    pub config: &'a HotspotConfig,
    pub channel: u32,
    pub country: &'a str,
    pub features: FeatureLevel,
}

impl ApSettings<'_> {
    pub fn band(&self) -> Band {
        Band::for_channel(self.channel)
    }
}

pub fn render_hostapd_conf(settings: &ApSettings<'_>) -> String {
    let band = settings.band();
    let cfg = settings.config;
    let extensions = match settings.features {
        FeatureLevel::Full if band.is_5ghz() => "wmm_enabled=1\nieee80211n=1\nieee80211ac=1\n",
        FeatureLevel::Full => "wmm_enabled=1\nieee80211n=1\n",
        FeatureLevel::Minimal => "wmm_enabled=0\n",
    };
    format!(
        "interface={iface}\n\
         driver=nl80211\n\
         ssid={ssid}\n\
         hw_mode={hw_mode}\n\
         channel={channel}\n\
         country_code={country}\n\
         ieee80211d=1\n\
         {extensions}\
         max_num_sta={max_clients}\n\
         macaddr_acl=0\n\
         auth_algs=1\n\
         ignore_broadcast_ssid={hidden}\n\
         wpa=2\n\
         wpa_passphrase={password}\n\
         wpa_key_mgmt=WPA-PSK\n\
         rsn_pairwise=CCMP\n",
        iface = settings.ap_iface,
        ssid = cfg.ssid,
        hw_mode = band.hw_mode(),
        channel = settings.channel,
        country = settings.country,
        max_clients = cfg.max_clients,
        hidden = u8::from(cfg.hidden),
        password = cfg.password,
    )
}

pub fn render_dnsmasq_conf(ap_iface: &str, paths: &HotspotPaths, max_clients: u32) -> String {
    let dns = UPSTREAM_DNS
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "interface={ap_iface}\n\
         bind-interfaces\n\
         dhcp-range={AP_DHCP_START},{AP_DHCP_END},{DHCP_LEASE_TIME}\n\
         dhcp-option=option:router,{AP_GATEWAY}\n\
         dhcp-option=option:dns-server,{dns}\n\
         dhcp-leasefile={}\n\
         log-facility={}\n\
         dhcp-lease-max={max_clients}\n",
        paths.dnsmasq_leases.display(),
        paths.dnsmasq_log.display(),
    )
}

pub fn write_hostapd_conf(paths: &HotspotPaths, settings: &ApSettings<'_>) -> Result<()> {
    write_artifact(&paths.hostapd_conf, &render_hostapd_conf(settings), "hostapd")?;
    debug!(
        "hostapd config written: channel {} ({:?}, {:?})",
        settings.channel,
        settings.band(),
        settings.features
    );
    Ok(())
}

pub fn write_dnsmasq_conf(paths: &HotspotPaths, ap_iface: &str, max_clients: u32) -> Result<()> {
    write_artifact(
        &paths.dnsmasq_conf,
        &render_dnsmasq_conf(ap_iface, paths, max_clients),
        "dnsmasq",
    )
}

fn write_artifact(path: &Path, contents: &str, daemon: &'static str) -> Result<()> {
    let generation = |source| HotspotError::ConfigGeneration { daemon, source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(generation)?;
    }
    fs::write(path, contents).map_err(generation)
}
