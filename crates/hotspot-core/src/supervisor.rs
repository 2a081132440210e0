//! hostapd startup with phased fallback.
//!
//! ```text
//! Full ──fail──▶ Minimal ──fail──▶ FallbackFull ──fail──▶ FallbackMinimal ──fail──▶ Failed
//!                        │
//!                        └─ no channel rejection, or requested band is 2.4GHz ──▶ Failed
//! ```
//!
//! The fallback phases force [`FALLBACK_CHANNEL`]. They run only once the
//! driver has rejected the requested channel and that channel was 5GHz.

use std::fs;
use std::io;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::{check_cancel, CancelFlag};
use crate::confgen::{write_hostapd_conf, ApSettings, Band, FeatureLevel};
use crate::config::HotspotConfig;
use crate::error::{HotspotError, Result};
use crate::exec::{CommandSpec, SystemOps};
use crate::nm::NetworkManagerExclusion;
use crate::paths::HotspotPaths;
use crate::process::find_pid;
use crate::regulatory::{apply_country, CountryCode};

pub const FALLBACK_CHANNEL: u32 = 6;
pub const REJECTION_SIGNATURE: &str = "could not select hw_mode and channel";
pub const LAUNCH_SETTLE: Duration = Duration::from_millis(1500);
const LOG_TAIL_LINES: usize = 5;
const LOG_TAIL_MAX_CHARS: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Full,
    Minimal,
    FallbackFull,
    FallbackMinimal,
}

impl Phase {
    pub fn features(self) -> FeatureLevel {
        match self {
            Phase::Full | Phase::FallbackFull => FeatureLevel::Full,
            Phase::Minimal | Phase::FallbackMinimal => FeatureLevel::Minimal,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, Phase::FallbackFull | Phase::FallbackMinimal)
    }

    pub fn channel(self, requested: u32) -> u32 {
        if self.is_fallback() {
            FALLBACK_CHANNEL
        } else {
            requested
        }
    }
}

/// The transition table. `rejection_seen` is sticky across phases.
pub fn next_phase(current: Phase, rejection_seen: bool, requested: Band) -> Option<Phase> {
    match current {
        Phase::Full => Some(Phase::Minimal),
        Phase::Minimal if rejection_seen && requested.is_5ghz() => Some(Phase::FallbackFull),
        Phase::Minimal => None,
        Phase::FallbackFull => Some(Phase::FallbackMinimal),
        Phase::FallbackMinimal => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    pub pid: i32,
    pub channel: u32,
    pub phase: Phase,
}

#[derive(Debug, Clone)]
pub struct StartRequest<'a> {
    pub ap_iface: &'a str,
    pub config: &'a HotspotConfig,
    /// Already resolved, never 0
    pub channel: u32,
    pub country: &'a CountryCode,
}

pub struct ApDaemonSupervisor<'a> {
    ops: &'a dyn SystemOps,
    paths: &'a HotspotPaths,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> ApDaemonSupervisor<'a> {
    pub fn new(ops: &'a dyn SystemOps, paths: &'a HotspotPaths, cancel: Option<&'a CancelFlag>) -> Self {
        Self { ops, paths, cancel }
    }

    pub fn start(&self, req: &StartRequest<'_>) -> Result<StartOutcome> {
        let requested_band = Band::for_channel(req.channel);
        apply_country(self.ops, req.country);

        let mut phase = Phase::Full;
        let mut rejection_seen = false;
        let mut last_tail: String;

        loop {
            check_cancel(self.cancel)?;
            let channel = phase.channel(req.channel);
            info!("Starting hostapd: phase {phase:?}, channel {channel}");

            match self.attempt(req, phase, channel)? {
                Ok(pid) => {
                    info!("hostapd running (pid {pid}) on channel {channel}");
                    return Ok(StartOutcome { pid, channel, phase });
                }
                Err(tail) => {
                    if is_channel_rejection(&tail) {
                        warn!("hostapd rejected channel {channel} in phase {phase:?}");
                        rejection_seen = true;
                    } else {
                        warn!("hostapd failed in phase {phase:?}");
                    }
                    last_tail = tail;
                }
            }

            match next_phase(phase, rejection_seen, requested_band) {
                Some(next) => phase = next,
                None => break,
            }
        }

        Err(HotspotError::DaemonRejected(failure_message(
            req.channel,
            rejection_seen,
            &last_tail,
        )))
    }

    /// Outer error aborts the whole start; inner error carries the log tail
    /// of a failed attempt.
    fn attempt(
        &self,
        req: &StartRequest<'_>,
        phase: Phase,
        channel: u32,
    ) -> Result<std::result::Result<i32, String>> {
        let settings = ApSettings {
            ap_iface: req.ap_iface,
            config: req.config,
            channel,
            country: &req.country.code,
            features: phase.features(),
        };
        write_hostapd_conf(self.paths, &settings)?;

        let nm = NetworkManagerExclusion::new(self.ops, self.paths);
        nm.detach_supplicant(req.ap_iface);
        nm.reassert(req.ap_iface);
        // hostapd brings the interface up itself and wants it down first
        self.ops
            .run_silent(&CommandSpec::new("ip").args(["link", "set", req.ap_iface, "down"]));
        remove_if_present(&self.paths.hostapd_log);

        let conf = self.paths.hostapd_conf.display().to_string();
        let log = self.paths.hostapd_log.display().to_string();
        let status = self
            .ops
            .run_silent(&CommandSpec::new("hostapd").args(["-B", conf.as_str(), "-f", log.as_str()]));

        if status == 0 {
            self.ops.sleep(LAUNCH_SETTLE);
            if let Some(pid) = find_pid(self.ops, &conf) {
                return Ok(Ok(pid));
            }
            debug!("hostapd exited 0 but no process matches {conf}");
        } else {
            debug!("hostapd exited {status}");
        }

        let tail = read_log_tail(&self.paths.hostapd_log);
        self.ops
            .run_silent(&CommandSpec::new("pkill").args(["-f", conf.as_str()]));
        Ok(Err(tail))
    }
}

pub fn is_channel_rejection(log: &str) -> bool {
    log.to_ascii_lowercase().contains(REJECTION_SIGNATURE)
}

pub fn failure_message(requested_channel: u32, rejection_seen: bool, tail: &str) -> String {
    if rejection_seen && Band::for_channel(requested_channel).is_5ghz() {
        return format!(
            "hostapd could not use 5GHz channel {requested_channel} or fallback channel \
             {FALLBACK_CHANNEL} on this radio. Connect the client to a 2.4GHz network and retry."
        );
    }
    let flat = flatten(tail);
    if flat.is_empty() {
        "hostapd failed and left no log output.".to_string()
    } else {
        format!("hostapd failed: {flat}")
    }
}

fn flatten(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(LOG_TAIL_MAX_CHARS)
        .collect()
}

fn read_log_tail(path: &std::path::Path) -> String {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let lines: Vec<&str> = contents.lines().collect();
            let start = lines.len().saturating_sub(LOG_TAIL_LINES);
            lines[start..].join("\n")
        }
        Err(err) => {
            debug!("No hostapd log at {}: {}", path.display(), err);
            String::new()
        }
    }
}

fn remove_if_present(path: &std::path::Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            debug!("Could not remove {}: {}", path.display(), err);
        }
    }
}
