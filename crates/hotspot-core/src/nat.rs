//! IPv4 forwarding and iptables NAT between the client and AP interfaces.

use tracing::{debug, info, warn};

use crate::exec::{CommandSpec, SystemOps};

const FORWARD_SYSCTL: &str = "net.ipv4.ip_forward";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Filter,
    Nat,
}

impl Table {
    fn as_str(&self) -> &str {
        match self {
            Table::Filter => "filter",
            Table::Nat => "nat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Forward,
    Postrouting,
}

impl Chain {
    fn as_str(&self) -> &str {
        match self {
            Chain::Forward => "FORWARD",
            Chain::Postrouting => "POSTROUTING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Accept,
    Masquerade,
}

impl Target {
    fn as_str(&self) -> &str {
        match self {
            Target::Accept => "ACCEPT",
            Target::Masquerade => "MASQUERADE",
        }
    }
}

/// One iptables rule, rendered identically for `-A` and `-D`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    table: Table,
    chain: Chain,
    in_interface: Option<String>,
    out_interface: Option<String>,
    state: Option<String>,
    target: Target,
}

impl Rule {
    pub fn new(table: Table, chain: Chain, target: Target) -> Self {
        Self {
            table,
            chain,
            in_interface: None,
            out_interface: None,
            state: None,
            target,
        }
    }

    pub fn in_interface(mut self, iface: &str) -> Self {
        self.in_interface = Some(iface.to_string());
        self
    }

    pub fn out_interface(mut self, iface: &str) -> Self {
        self.out_interface = Some(iface.to_string());
        self
    }

    pub fn connection_state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    fn to_args(&self, action: &str) -> Vec<String> {
        let mut args = Vec::new();
        // filter is iptables' default table
        if self.table != Table::Filter {
            args.push("-t".to_string());
            args.push(self.table.as_str().to_string());
        }
        args.push(action.to_string());
        args.push(self.chain.as_str().to_string());

        if let Some(iface) = &self.in_interface {
            args.push("-i".to_string());
            args.push(iface.clone());
        }
        if let Some(iface) = &self.out_interface {
            args.push("-o".to_string());
            args.push(iface.clone());
        }
        if let Some(state) = &self.state {
            args.push("-m".to_string());
            args.push("state".to_string());
            args.push("--state".to_string());
            args.push(state.clone());
        }

        args.push("-j".to_string());
        args.push(self.target.as_str().to_string());
        args
    }

    pub fn add_command(&self) -> CommandSpec {
        CommandSpec::new("iptables").args(self.to_args("-A"))
    }

    pub fn delete_command(&self) -> CommandSpec {
        CommandSpec::new("iptables").args(self.to_args("-D"))
    }
}

/// Masquerade out the client interface, return traffic into the AP, and
/// everything from the AP out.
pub fn hotspot_rules(client_iface: &str, ap_iface: &str) -> [Rule; 3] {
    [
        Rule::new(Table::Nat, Chain::Postrouting, Target::Masquerade).out_interface(client_iface),
        Rule::new(Table::Filter, Chain::Forward, Target::Accept)
            .in_interface(client_iface)
            .out_interface(ap_iface)
            .connection_state("RELATED,ESTABLISHED"),
        Rule::new(Table::Filter, Chain::Forward, Target::Accept)
            .in_interface(ap_iface)
            .out_interface(client_iface),
    ]
}

pub fn read_forwarding(ops: &dyn SystemOps) -> Option<bool> {
    let out = ops.run_capturing(&CommandSpec::new("sysctl").args(["-n", FORWARD_SYSCTL]));
    if !out.success() {
        return None;
    }
    match out.stdout.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn set_forwarding(ops: &dyn SystemOps, enabled: bool) {
    let assignment = format!("{FORWARD_SYSCTL}={}", u8::from(enabled));
    let status = ops.run_silent(&CommandSpec::new("sysctl").args(["-w", assignment.as_str()]));
    if status != 0 {
        warn!("sysctl -w {assignment} failed (exit {status})");
    }
}

/// Snapshot of forwarding before `enable`. `None` means NAT was never
/// enabled and teardown leaves forwarding alone. An unreadable value at
/// `enable` time is recorded as `Some(false)`, so teardown turns forwarding
/// back off.
pub type ForwardingSnapshot = Option<bool>;

/// Installs forwarding and NAT. Returns the forwarding state read before
/// any change.
pub fn enable(ops: &dyn SystemOps, client_iface: &str, ap_iface: &str) -> ForwardingSnapshot {
    let before = read_forwarding(ops).unwrap_or_else(|| {
        warn!("Could not read {FORWARD_SYSCTL}, assuming it was off");
        false
    });
    debug!("ip_forward before hotspot: {before}");
    set_forwarding(ops, true);

    for rule in hotspot_rules(client_iface, ap_iface) {
        let cmd = rule.add_command();
        let status = ops.run_silent(&cmd);
        if status != 0 {
            warn!("{cmd} failed (exit {status})");
        }
    }
    info!("NAT enabled: {ap_iface} -> {client_iface}");
    Some(before)
}

/// Removes the rules and turns forwarding off only when it was off before
/// `enable` ran.
pub fn disable(ops: &dyn SystemOps, client_iface: &str, ap_iface: &str, before: ForwardingSnapshot) {
    if !client_iface.is_empty() && !ap_iface.is_empty() {
        for rule in hotspot_rules(client_iface, ap_iface) {
            let cmd = rule.delete_command();
            let status = ops.run_silent(&cmd);
            if status != 0 {
                debug!("{cmd} exited {status}");
            }
        }
    }
    if before == Some(false) {
        set_forwarding(ops, false);
    }
}
