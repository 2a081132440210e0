//! Runtime state owned by the orchestrator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bounded::BoundedList;
use crate::config::HotspotConfig;
use crate::leases::ConnectedClient;
use crate::probe::WifiClientInterface;
use crate::regulatory::CountryCode;
use crate::supervisor::Phase;

pub const ROSTER_CAPACITY: usize = 64;
pub const EVENT_CAPACITY: usize = 200;

/// ```text
/// Stopped ─▶ Starting ─▶ Running ─▶ Stopping ─▶ Stopped
///               │           │
///               ▼           ▼
///             Error ◀───────┘   (start() is allowed again from Error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotspotStatus {
    pub state: LifecycleState,
    pub config: HotspotConfig,
    pub client: Option<WifiClientInterface>,
    pub ap_iface: Option<String>,
    pub phy: Option<String>,
    pub ap_channel: Option<u32>,
    pub phase: Option<Phase>,
    pub country: Option<CountryCode>,
    pub clients: BoundedList<ConnectedClient>,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub hostapd_pid: Option<i32>,
    pub dnsmasq_pid: Option<i32>,
    /// ip_forward as read before NAT was installed; `None` until then
    pub forwarding_before: Option<bool>,
    pub nat_active: bool,
    pub events: BoundedList<StatusEvent>,
}

impl HotspotStatus {
    pub fn new(config: HotspotConfig) -> Self {
        Self {
            state: LifecycleState::Stopped,
            config,
            client: None,
            ap_iface: None,
            phy: None,
            ap_channel: None,
            phase: None,
            country: None,
            clients: BoundedList::new(ROSTER_CAPACITY),
            started_at: None,
            error: None,
            hostapd_pid: None,
            dnsmasq_pid: None,
            forwarding_before: None,
            nat_active: false,
            events: BoundedList::new(EVENT_CAPACITY),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    pub fn record(&mut self, message: impl Into<String>) {
        self.events.push(StatusEvent {
            at: Utc::now(),
            message: message.into(),
        });
    }

    pub fn uptime_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.started_at
            .map(|started| (now - started).num_seconds().max(0) as u64)
    }

    pub fn uptime_string(&self, now: DateTime<Utc>) -> String {
        format_uptime(self.uptime_secs(now))
    }

    pub fn current_uptime(&self) -> String {
        self.uptime_string(Utc::now())
    }
}

/// `45s`, `2m 5s`, `1h 2m 5s`; `--` when not started.
pub fn format_uptime(elapsed: Option<u64>) -> String {
    let Some(elapsed) = elapsed else {
        return "--".to_string();
    };
    let hours = elapsed / 3600;
    let minutes = (elapsed % 3600) / 60;
    let seconds = elapsed % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
