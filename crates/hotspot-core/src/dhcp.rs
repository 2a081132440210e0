//! dnsmasq launch for the AP subnet.

use std::fs;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{HotspotError, Result};
use crate::exec::{CommandSpec, SystemOps};
use crate::paths::HotspotPaths;
use crate::process::parse_pid;

pub const DNSMASQ_START_FAILED: &str = "Failed to start dnsmasq. Port 53 may be in use.";
const STOP_SETTLE: Duration = Duration::from_millis(300);
const PIDFILE_SETTLE: Duration = Duration::from_millis(300);

/// Starts dnsmasq against the generated config and returns its pid.
pub fn start_dnsmasq(ops: &dyn SystemOps, paths: &HotspotPaths) -> Result<i32> {
    let conf = paths.dnsmasq_conf.display().to_string();
    ops.run_silent(&CommandSpec::new("pkill").args(["-f", conf.as_str()]));
    if ops.tool_available("systemctl") {
        // a system-wide instance would hold port 53
        ops.run_silent(&CommandSpec::new("systemctl").args(["stop", "dnsmasq"]));
    }
    ops.sleep(STOP_SETTLE);

    let pid_arg = format!("--pid-file={}", paths.dnsmasq_pid.display());
    let status = ops.run_silent(&CommandSpec::new("dnsmasq").args(["-C", conf.as_str(), pid_arg.as_str()]));
    if status != 0 {
        debug!("dnsmasq exited {status}");
        return Err(HotspotError::DhcpStart(DNSMASQ_START_FAILED.to_string()));
    }

    ops.sleep(PIDFILE_SETTLE);
    let pid = fs::read_to_string(&paths.dnsmasq_pid)
        .ok()
        .and_then(|raw| parse_pid(&raw))
        .ok_or_else(|| HotspotError::DhcpStart(DNSMASQ_START_FAILED.to_string()))?;
    info!("dnsmasq running (pid {pid})");
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::{fake_dnsmasq, MockSystemOps};
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, HotspotPaths) {
        let tmp = TempDir::new().unwrap();
        let paths = HotspotPaths::rooted_at(tmp.path());
        fs::create_dir_all(paths.runtime_dir().unwrap()).unwrap();
        (tmp, paths)
    }

    #[test]
    fn pid_comes_from_pid_file() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        fake_dnsmasq(&ops, &paths, 900);
        assert_eq!(start_dnsmasq(&ops, &paths).unwrap(), 900);
        let stop = ops.position("systemctl stop dnsmasq").unwrap();
        let launch = ops.position("dnsmasq -C").unwrap();
        assert!(stop < launch);
        assert!(ops.ran(&format!(
            "dnsmasq -C {} --pid-file={}",
            paths.dnsmasq_conf.display(),
            paths.dnsmasq_pid.display()
        )));
    }

    #[test]
    fn launch_failure_mentions_port_53() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        ops.respond("dnsmasq -C", CommandOutput::failed(2));
        let err = start_dnsmasq(&ops, &paths).unwrap_err();
        assert_eq!(err.to_string(), DNSMASQ_START_FAILED);
    }

    #[test]
    fn missing_pid_file_is_a_start_failure() {
        let (_tmp, paths) = sandbox();
        let ops = MockSystemOps::new();
        ops.set_missing("systemctl");
        assert!(matches!(start_dnsmasq(&ops, &paths), Err(HotspotError::DhcpStart(_))));
        assert!(ops.calls_starting_with("systemctl").is_empty());
    }
}
