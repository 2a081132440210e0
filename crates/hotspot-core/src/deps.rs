//! External tool capability report.

use std::fmt;

use serde::Serialize;

use crate::exec::SystemOps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Iw,
    Hostapd,
    Dnsmasq,
    Iptables,
    Nmcli,
    Connmanctl,
    WpaCli,
    Rfkill,
    Systemctl,
}

impl Tool {
    pub const ALL: [Tool; 9] = [
        Tool::Iw,
        Tool::Hostapd,
        Tool::Dnsmasq,
        Tool::Iptables,
        Tool::Nmcli,
        Tool::Connmanctl,
        Tool::WpaCli,
        Tool::Rfkill,
        Tool::Systemctl,
    ];

    pub fn binary(self) -> &'static str {
        match self {
            Tool::Iw => "iw",
            Tool::Hostapd => "hostapd",
            Tool::Dnsmasq => "dnsmasq",
            Tool::Iptables => "iptables",
            Tool::Nmcli => "nmcli",
            Tool::Connmanctl => "connmanctl",
            Tool::WpaCli => "wpa_cli",
            Tool::Rfkill => "rfkill",
            Tool::Systemctl => "systemctl",
        }
    }

    pub fn purpose(self) -> &'static str {
        match self {
            Tool::Iw => "virtual interface and regulatory control",
            Tool::Hostapd => "access point daemon",
            Tool::Dnsmasq => "DHCP and DNS for hotspot clients",
            Tool::Iptables => "NAT and forwarding rules",
            Tool::Nmcli => "NetworkManager exclusion",
            Tool::Connmanctl => "connman exclusion",
            Tool::WpaCli => "supplicant detach",
            Tool::Rfkill => "radio unblock",
            Tool::Systemctl => "stopping the system dnsmasq service",
        }
    }

    pub fn required(self) -> bool {
        matches!(
            self,
            Tool::Iw | Tool::Hostapd | Tool::Dnsmasq | Tool::Iptables
        )
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: Tool,
    pub binary: &'static str,
    pub purpose: &'static str,
    pub required: bool,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    pub tools: Vec<ToolStatus>,
}

impl DependencyReport {
    pub fn check(ops: &dyn SystemOps) -> Self {
        let tools = Tool::ALL
            .into_iter()
            .map(|tool| ToolStatus {
                tool,
                binary: tool.binary(),
                purpose: tool.purpose(),
                required: tool.required(),
                present: ops.tool_available(tool.binary()),
            })
            .collect();
        Self { tools }
    }

    pub fn missing_required(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .filter(|status| status.required && !status.present)
            .map(|status| status.tool)
            .collect()
    }

    pub fn ready(&self) -> bool {
        self.missing_required().is_empty()
    }
}
