use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "hotspot-enabler",
    author,
    version,
    about = "Share an upstream WiFi connection through a virtual access point on the same radio"
)]
pub struct Cli {
    /// Persisted hotspot config (defaults to /etc/hotspot-enabler/hotspot.conf)
    #[arg(long, global = true, env = "HOTSPOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for generated daemon configs, logs and leases (defaults to /tmp)
    #[arg(long, global = true, env = "HOTSPOT_RUNTIME_DIR")]
    pub runtime_dir: Option<PathBuf>,

    /// Output format for command responses
    #[arg(
        long = "output",
        value_enum,
        default_value_t = OutputFormat::Text,
        global = true
    )]
    pub output_format: OutputFormat,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report which external tools are installed
    Check,
    /// Probe the WiFi client interface and its radio
    Status,
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Start the hotspot and supervise it until interrupted
    Run(RunArgs),
    /// Remove interfaces, rules and files left by a previous run
    Cleanup,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the persisted config
    Show,
    /// Validate and save one field
    Set(ConfigSetArgs),
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// ssid, password, channel, max_clients or hidden
    pub field: String,
    pub value: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Status refresh interval in milliseconds
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(100..))]
    pub refresh_ms: u64,
}
