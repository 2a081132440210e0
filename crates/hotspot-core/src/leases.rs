//! Connected-client roster derived from the DHCP daemon's lease store.

use std::fs;
use std::net::IpAddr;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

/// Displayed for clients that did not send a hostname.
pub const ANONYMOUS_HOSTNAME: &str = "(unknown)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedClient {
    pub mac: String,
    pub ip: IpAddr,
    pub hostname: String,
}

/// Reads at most `max` clients; a missing lease file is an empty roster.
pub fn list_connected_clients(lease_file: &Path, max: usize) -> Vec<ConnectedClient> {
    match fs::read_to_string(lease_file) {
        Ok(contents) => parse_leases(&contents, max),
        Err(err) => {
            debug!("No lease data at {}: {}", lease_file.display(), err);
            Vec::new()
        }
    }
}

/// Lease records are `timestamp mac ip hostname [clientid]`.
pub fn parse_leases(contents: &str, max: usize) -> Vec<ConnectedClient> {
    contents
        .lines()
        .filter_map(parse_lease_line)
        .take(max)
        .collect()
}

fn parse_lease_line(line: &str) -> Option<ConnectedClient> {
    let mut fields = line.split_whitespace();
    let _expiry = fields.next()?;
    let mac = fields.next()?;
    let ip = fields.next()?.parse::<IpAddr>().ok()?;
    let hostname = match fields.next() {
        None | Some("*") => ANONYMOUS_HOSTNAME.to_string(),
        Some(name) => name.to_string(),
    };
    Some(ConnectedClient {
        mac: mac.to_string(),
        ip,
        hostname,
    })
}
