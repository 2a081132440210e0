//! Supervised daemon process helpers.

use std::time::Duration;

use tracing::{debug, warn};

use crate::exec::{CommandSpec, ProcessSignal, SystemOps};

pub const TERMINATE_POLLS: u32 = 30;
pub const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn is_alive(ops: &dyn SystemOps, pid: Option<i32>) -> bool {
    pid.is_some_and(|pid| pid > 0 && ops.signal(pid, ProcessSignal::Probe))
}

/// SIGTERM, bounded wait, SIGKILL, then a `pkill -9 -f <pattern>` sweep
/// for stragglers started with the same config.
pub fn terminate(ops: &dyn SystemOps, pid: Option<i32>, name: &str, sweep_pattern: &str) {
    if let Some(pid) = pid.filter(|pid| *pid > 0) {
        if ops.signal(pid, ProcessSignal::Terminate) {
            if !wait_for_exit(ops, pid) {
                warn!("{name} (pid {pid}) ignored SIGTERM, sending SIGKILL");
                ops.signal(pid, ProcessSignal::Kill);
            } else {
                debug!("{name} (pid {pid}) exited");
            }
        }
    }
    if !sweep_pattern.is_empty() {
        ops.run_silent(&CommandSpec::new("pkill").args(["-9", "-f", sweep_pattern]));
    }
}

fn wait_for_exit(ops: &dyn SystemOps, pid: i32) -> bool {
    for _ in 0..TERMINATE_POLLS {
        if !ops.signal(pid, ProcessSignal::Probe) {
            return true;
        }
        ops.sleep(TERMINATE_POLL_INTERVAL);
    }
    !ops.signal(pid, ProcessSignal::Probe)
}

/// First pid from `pgrep -f <pattern>`.
pub fn find_pid(ops: &dyn SystemOps, pattern: &str) -> Option<i32> {
    let out = ops.run_capturing(&CommandSpec::new("pgrep").args(["-f", pattern]));
    if !out.success() {
        return None;
    }
    parse_pid(&out.stdout)
}

pub fn parse_pid(text: &str) -> Option<i32> {
    text.lines()
        .next()?
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
}
