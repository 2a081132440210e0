mod cli;
mod operations;

use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use hotspot_core::{new_flag, CancelFlag, HotspotPaths};
use hotspot_logging::LoggingConfig;
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::operations::dispatch_command;

fn main() {
    let cli = Cli::parse();
    let format = cli.output_format;

    let mut log_cfg = LoggingConfig::from_env();
    if cli.verbose {
        log_cfg = log_cfg.with_level("debug");
    }
    // Held for the process lifetime so the file writer keeps flushing.
    let _guards = match hotspot_logging::init("hotspot-enabler", &log_cfg) {
        Ok(guards) => Some(guards),
        Err(err) => {
            eprintln!("logging disabled: {err:#}");
            None
        }
    };

    if let Err(err) = run(cli, format) {
        emit_error(format, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, output_format: OutputFormat) -> Result<()> {
    let paths = resolve_paths(&cli);
    let cancel = new_flag();
    if matches!(cli.command, Commands::Run(_)) {
        install_shutdown_handler(&cancel)?;
    }
    let (message, data) = dispatch_command(&paths, cli.command, cancel)?;
    emit_success(output_format, message, data)
}

fn resolve_paths(cli: &Cli) -> HotspotPaths {
    let mut paths = HotspotPaths::from_env();
    if let Some(dir) = cli.runtime_dir.as_deref() {
        paths = paths.with_runtime_dir(dir);
    }
    if let Some(config) = cli.config.clone() {
        paths = paths.with_config_file(config);
    }
    debug!("Using config {}", paths.config_file.display());
    paths
}

/// SIGINT/SIGTERM only set the flag; the control loop does the teardown.
fn install_shutdown_handler(cancel: &CancelFlag) -> Result<()> {
    let flag = cancel.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("installing shutdown signal handler")
}

fn emit_success(format: OutputFormat, message: String, data: Value) -> Result<()> {
    emit_payload(format, "ok", message, data)
}

fn emit_error(format: OutputFormat, err: &anyhow::Error) {
    let details: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    let payload = json!({
        "status": "error",
        "message": err.to_string(),
        "details": details,
        "data": Value::Null,
    });

    match format {
        OutputFormat::Json => println!("{}", payload),
        OutputFormat::Text => {
            eprintln!("Error: {}", err);
            for detail in details.iter().skip(1) {
                eprintln!("  -> {}", detail);
            }
        }
    }
}

fn emit_payload(format: OutputFormat, status: &str, message: String, data: Value) -> Result<()> {
    let payload = json!({
        "status": status,
        "message": message,
        "data": data,
    });

    match format {
        OutputFormat::Json => println!("{}", payload),
        OutputFormat::Text => {
            println!("{}", payload["message"].as_str().unwrap_or_default());
            if !payload["data"].is_null() {
                let pretty = serde_json::to_string_pretty(&payload["data"])?;
                println!("{pretty}");
            }
        }
    }
    Ok(())
}
