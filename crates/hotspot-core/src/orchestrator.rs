//! Hotspot lifecycle: start, stop, cleanup and periodic refresh.
//!
//! Start order is fixed: detect client, create AP interface, exclude it from
//! network managers, write configs, hostapd (which brings the link up),
//! gateway address, dnsmasq, NAT. Teardown reverses it and never fails.

use std::fs;
use std::io;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::cancel::{check_cancel, CancelFlag};
use crate::confgen::{resolve_channel, write_dnsmasq_conf};
use crate::config::HotspotConfig;
use crate::dhcp::start_dnsmasq;
use crate::error::{HotspotError, Result};
use crate::exec::{CommandSpec, SystemOps};
use crate::leases::list_connected_clients;
use crate::nat;
use crate::nm::NetworkManagerExclusion;
use crate::paths::HotspotPaths;
use crate::probe::{self, WifiClientInterface};
use crate::process::{is_alive, terminate};
use crate::regulatory::{detect_country, env_locale};
use crate::state::{HotspotStatus, LifecycleState, ROSTER_CAPACITY};
use crate::supervisor::{ApDaemonSupervisor, StartRequest};
use crate::vif::{VirtualInterfaceManager, AP_CANDIDATES};

pub const NO_WIFI_INTERFACE: &str = "No WiFi interface detected.";
pub const NO_PHYSICAL_RADIO: &str = "Cannot determine physical WiFi device.";
pub const HOSTAPD_DIED: &str = "hostapd process died unexpectedly.";
pub const DNSMASQ_DIED: &str = "dnsmasq process died unexpectedly.";

pub struct Hotspot {
    ops: Arc<dyn SystemOps>,
    paths: HotspotPaths,
    status: HotspotStatus,
    cancel: Option<CancelFlag>,
    locale: Option<String>,
}

impl Hotspot {
    pub fn new(ops: Arc<dyn SystemOps>, paths: HotspotPaths, config: HotspotConfig) -> Self {
        Self {
            ops,
            paths,
            status: HotspotStatus::new(config),
            cancel: None,
            locale: env_locale(),
        }
    }

    /// Polled between start phases.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    pub fn status(&self) -> &HotspotStatus {
        &self.status
    }

    pub fn paths(&self) -> &HotspotPaths {
        &self.paths
    }

    /// Takes effect on the next start.
    pub fn set_config(&mut self, config: HotspotConfig) {
        self.status.config = config;
    }

    pub fn start(&mut self) -> Result<()> {
        match self.status.state {
            LifecycleState::Stopped => {}
            LifecycleState::Error => {
                debug!("Clearing resources left by the previous failure");
                self.cleanup();
            }
            state => {
                return Err(HotspotError::InvalidState(format!(
                    "cannot start while {state}"
                )));
            }
        }

        self.status.state = LifecycleState::Starting;
        self.status.error = None;
        self.status.record("Starting hotspot");
        info!("Starting hotspot \"{}\"", self.status.config.ssid);

        match self.run_start() {
            Ok(()) => {
                self.status.state = LifecycleState::Running;
                self.status.started_at = Some(Utc::now());
                self.status.clients.clear();
                let msg = format!(
                    "Hotspot running on {} channel {}",
                    self.status.ap_iface.as_deref().unwrap_or("?"),
                    self.status.ap_channel.unwrap_or_default()
                );
                info!("{msg}");
                self.status.record(msg);
                Ok(())
            }
            Err(err) if err.is_cancelled() => {
                warn!("Start cancelled, tearing down");
                self.cleanup();
                self.status.state = LifecycleState::Stopped;
                self.status.record("Start cancelled");
                Err(err)
            }
            Err(err) => {
                let msg = err.to_string();
                error!("Hotspot start failed: {msg}");
                self.status.error = Some(msg.clone());
                self.status.record(msg);
                self.cleanup();
                self.status.state = LifecycleState::Error;
                Err(err)
            }
        }
    }

    fn run_start(&mut self) -> Result<()> {
        let ops = Arc::clone(&self.ops);
        let ops: &dyn SystemOps = ops.as_ref();
        let paths = &self.paths;
        let cancel = self.cancel.as_ref();
        let config = self.status.config.clone();

        check_cancel(cancel)?;
        let name = probe::detect_client_interface(paths, &AP_CANDIDATES)
            .ok_or_else(|| HotspotError::detection(NO_WIFI_INTERFACE))?;
        let mut client = WifiClientInterface::named(name);
        probe::refresh(ops, paths, &mut client);
        let phy = probe::radio_for(paths, &client.name)
            .ok_or_else(|| HotspotError::detection(NO_PHYSICAL_RADIO))?;
        client.phy = Some(phy.clone());
        let phy_info = ops.run_capturing(&CommandSpec::new("iw").args(["phy", phy.as_str(), "info"]));
        client.supports_ap = phy_info.success() && probe::check_ap_concurrency(&phy_info.stdout);
        if !client.supports_ap {
            warn!("{phy} does not advertise AP/STA concurrency, trying anyway");
        }
        info!(
            "Client {} on {} (channel {}, ssid {:?})",
            client.name, phy, client.channel, client.ssid
        );
        self.status.client = Some(client.clone());
        self.status.phy = Some(phy.clone());

        check_cancel(cancel)?;
        let ap = VirtualInterfaceManager::new(ops, paths).create(&phy, &client.name)?;
        self.status.ap_iface = Some(ap.clone());
        self.status.record(format!("Created {ap}"));

        check_cancel(cancel)?;
        NetworkManagerExclusion::new(ops, paths).exclude(&ap);

        let channel = resolve_channel(config.channel, client.channel);
        let country = detect_country(ops, self.locale.as_deref());
        debug!("Country {} ({:?})", country.code, country.source);
        self.status.country = Some(country.clone());
        write_dnsmasq_conf(paths, &ap, config.max_clients)?;

        check_cancel(cancel)?;
        let outcome = ApDaemonSupervisor::new(ops, paths, cancel).start(&StartRequest {
            ap_iface: &ap,
            config: &config,
            channel,
            country: &country,
        })?;
        self.status.hostapd_pid = Some(outcome.pid);
        self.status.ap_channel = Some(outcome.channel);
        self.status.phase = Some(outcome.phase);

        check_cancel(cancel)?;
        VirtualInterfaceManager::new(ops, paths).assign_address(&ap);

        check_cancel(cancel)?;
        self.status.dnsmasq_pid = Some(start_dnsmasq(ops, paths)?);

        check_cancel(cancel)?;
        self.status.forwarding_before = nat::enable(ops, &client.name, &ap);
        self.status.nat_active = true;
        Ok(())
    }

    /// Always succeeds.
    pub fn stop(&mut self) -> bool {
        info!("Stopping hotspot");
        self.status.state = LifecycleState::Stopping;
        self.cleanup();
        self.status.state = LifecycleState::Stopped;
        self.status.record("Hotspot stopped");
        true
    }

    /// Releases everything the hotspot may own. Safe from any state and
    /// safe to repeat.
    pub fn cleanup(&mut self) {
        let ops = Arc::clone(&self.ops);
        let ops: &dyn SystemOps = ops.as_ref();
        let paths = &self.paths;

        let hostapd_conf = paths.hostapd_conf.display().to_string();
        let dnsmasq_conf = paths.dnsmasq_conf.display().to_string();
        terminate(ops, self.status.hostapd_pid.take(), "hostapd", &hostapd_conf);
        terminate(ops, self.status.dnsmasq_pid.take(), "dnsmasq", &dnsmasq_conf);

        let client_name = self.status.client.as_ref().map(|c| c.name.clone());
        if self.status.nat_active {
            if let (Some(client), Some(ap)) = (client_name.as_deref(), self.status.ap_iface.as_deref()) {
                nat::disable(ops, client, ap, self.status.forwarding_before);
            }
        }
        self.status.nat_active = false;
        self.status.forwarding_before = None;

        let vif = VirtualInterfaceManager::new(ops, paths);
        if let Some(ap) = self.status.ap_iface.take() {
            vif.destroy(&ap);
        }
        for candidate in AP_CANDIDATES {
            if paths.interface_exists(candidate) {
                vif.destroy(candidate);
            }
        }

        NetworkManagerExclusion::new(ops, paths).restore();

        for file in paths.generated_files() {
            match fs::remove_file(file) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!("Failed to remove {}: {}", file.display(), err),
            }
        }

        self.status.clients.clear();
        self.status.started_at = None;
        debug!("Cleanup complete");
    }

    /// Cleanup after a crash of an earlier process: NAT rules are removed
    /// for every candidate AP name, since the previous state is gone.
    pub fn recover(&mut self) {
        let ops = Arc::clone(&self.ops);
        if let Some(client) = probe::detect_client_interface(&self.paths, &AP_CANDIDATES) {
            for candidate in AP_CANDIDATES {
                nat::disable(ops.as_ref(), &client, candidate, None);
            }
        }
        self.cleanup();
        self.status.state = LifecycleState::Stopped;
    }

    /// No-op unless running.
    pub fn refresh_status(&mut self) {
        if !self.status.is_running() {
            return;
        }
        let ops = Arc::clone(&self.ops);
        let ops: &dyn SystemOps = ops.as_ref();

        if self.status.hostapd_pid.is_some() && !is_alive(ops, self.status.hostapd_pid) {
            self.fail(HOSTAPD_DIED);
            return;
        }
        if self.status.dnsmasq_pid.is_some() && !is_alive(ops, self.status.dnsmasq_pid) {
            self.fail(DNSMASQ_DIED);
            return;
        }

        if let Some(client) = self.status.client.as_mut() {
            probe::refresh(ops, &self.paths, client);
        }
        let roster = list_connected_clients(&self.paths.dnsmasq_leases, ROSTER_CAPACITY);
        self.status.clients.replace(roster);
    }

    fn fail(&mut self, message: &str) {
        error!("{message}");
        self.status.error = Some(message.to_string());
        self.status.state = LifecycleState::Error;
        self.status.record(message);
    }
}
