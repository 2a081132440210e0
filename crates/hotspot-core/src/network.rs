//! Fixed addressing of the AP side.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

pub const AP_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 12, 1);
pub const AP_PREFIX_LEN: u8 = 24;
pub const AP_DHCP_START: Ipv4Addr = Ipv4Addr::new(192, 168, 12, 10);
pub const AP_DHCP_END: Ipv4Addr = Ipv4Addr::new(192, 168, 12, 254);
pub const DHCP_LEASE_TIME: &str = "12h";
pub const UPSTREAM_DNS: [Ipv4Addr; 2] = [Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)];

/// Gateway address with prefix, e.g. `192.168.12.1/24`.
pub fn gateway_cidr() -> Ipv4Net {
    // prefix 24 is always valid
    Ipv4Net::new(AP_GATEWAY, AP_PREFIX_LEN).unwrap_or_else(|_| Ipv4Net::from(AP_GATEWAY))
}
