use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hotspot_core::cancel::{cancel_sleep, is_cancelled};
use hotspot_core::orchestrator::NO_WIFI_INTERFACE;
use hotspot_core::{
    check_privileges, CancelFlag, ConfigField, ConfigStore, DependencyReport, Hotspot,
    HotspotConfig, HotspotPaths, LifecycleState, RealSystemOps, SystemOps,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cli::{Commands, ConfigCommand, ConfigSetArgs, RunArgs};

pub type HandlerResult = (String, Value);

pub fn dispatch_command(paths: &HotspotPaths, command: Commands, cancel: CancelFlag) -> Result<HandlerResult> {
    let ops: Arc<dyn SystemOps> = Arc::new(RealSystemOps);
    match command {
        Commands::Check => handle_check(ops.as_ref()),
        Commands::Status => handle_status(ops.as_ref(), paths),
        Commands::Config(sub) => match sub {
            ConfigCommand::Show => handle_config_show(paths),
            ConfigCommand::Set(args) => handle_config_set(paths, args),
        },
        Commands::Run(args) => handle_run(ops, paths, args, cancel),
        Commands::Cleanup => handle_cleanup(ops, paths),
    }
}

fn require_root() -> Result<()> {
    if !check_privileges() {
        bail!("hotspot-enabler must run as root (try sudo)");
    }
    Ok(())
}

/// Refuses to go further when a required tool is absent.
fn require_tools(ops: &dyn SystemOps) -> Result<DependencyReport> {
    let report = DependencyReport::check(ops);
    if !report.ready() {
        let names: Vec<&str> = report
            .missing_required()
            .iter()
            .map(|tool| tool.binary())
            .collect();
        bail!("Missing required tools: {}", names.join(", "));
    }
    Ok(report)
}

fn handle_check(ops: &dyn SystemOps) -> Result<HandlerResult> {
    let report = require_tools(ops)?;
    let data = serde_json::to_value(&report)?;
    Ok(("All required tools present".to_string(), data))
}

fn handle_status(ops: &dyn SystemOps, paths: &HotspotPaths) -> Result<HandlerResult> {
    let Some(iface) = hotspot_core::probe::probe_client(ops, paths, &hotspot_core::vif::AP_CANDIDATES) else {
        bail!(NO_WIFI_INTERFACE);
    };
    let message = match (&iface.ssid, iface.connected) {
        (Some(ssid), true) => format!("{} connected to {} on channel {}", iface.name, ssid, iface.channel),
        _ => format!("{} not connected", iface.name),
    };
    if !iface.supports_ap {
        warn!("{} does not advertise AP/STA concurrency", iface.name);
    }
    let band = hotspot_core::Band::for_channel(iface.channel);
    let data = json!({
        "interface": iface,
        "band": band,
    });
    Ok((message, data))
}

fn config_json(cfg: &HotspotConfig) -> Value {
    json!({
        "ssid": cfg.ssid,
        "password": "*".repeat(cfg.password.chars().count()),
        "channel": cfg.channel,
        "max_clients": cfg.max_clients,
        "hidden": cfg.hidden,
    })
}

fn handle_config_show(paths: &HotspotPaths) -> Result<HandlerResult> {
    let store = ConfigStore::open(paths.config_file.clone())?;
    Ok((
        format!("Config at {}", store.path().display()),
        config_json(store.config()),
    ))
}

fn handle_config_set(paths: &HotspotPaths, args: ConfigSetArgs) -> Result<HandlerResult> {
    let field: ConfigField = args.field.parse()?;
    let mut store = ConfigStore::open(paths.config_file.clone())?;
    store
        .save_field(field, &args.value)
        .with_context(|| format!("updating {field}"))?;
    Ok((format!("{field} saved"), config_json(store.config())))
}

fn handle_run(
    ops: Arc<dyn SystemOps>,
    paths: &HotspotPaths,
    args: RunArgs,
    cancel: CancelFlag,
) -> Result<HandlerResult> {
    require_root()?;
    require_tools(ops.as_ref())?;
    let store = ConfigStore::open(paths.config_file.clone())?;
    let mut hotspot = Hotspot::new(ops, paths.clone(), store.config().clone()).with_cancel(cancel.clone());

    if let Err(err) = hotspot.start() {
        if err.is_cancelled() {
            return Ok(("Start cancelled".to_string(), Value::Null));
        }
        return Err(err).context("starting hotspot");
    }

    let status = hotspot.status();
    info!(
        "Hotspot \"{}\" up on {} (channel {}). Ctrl+C to stop.",
        status.config.ssid,
        status.ap_iface.as_deref().unwrap_or("?"),
        status.ap_channel.unwrap_or_default()
    );

    let refresh = Duration::from_millis(args.refresh_ms);
    let mut last_clients = 0;
    while !is_cancelled(Some(&cancel)) {
        if cancel_sleep(Some(&cancel), refresh).is_err() {
            break;
        }
        hotspot.refresh_status();
        let status = hotspot.status();
        if status.state == LifecycleState::Error {
            break;
        }
        if status.clients.len() != last_clients {
            last_clients = status.clients.len();
            info!(
                "{} client(s) connected, uptime {}",
                last_clients,
                status.current_uptime()
            );
        }
    }

    let status = hotspot.status();
    let failure = (status.state == LifecycleState::Error)
        .then(|| status.error.clone())
        .flatten();
    let uptime = status.current_uptime();
    let events = status.events.len();
    hotspot.stop();

    if let Some(err) = failure {
        bail!(err);
    }
    Ok((
        format!("Hotspot stopped after {uptime}"),
        json!({ "uptime": uptime, "events": events }),
    ))
}

fn handle_cleanup(ops: Arc<dyn SystemOps>, paths: &HotspotPaths) -> Result<HandlerResult> {
    require_root()?;
    let mut hotspot = Hotspot::new(ops, paths.clone(), HotspotConfig::default());
    hotspot.recover();
    Ok(("Cleanup complete".to_string(), Value::Null))
}
