//! Scripted [`SystemOps`] for tests.

use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::exec::{CommandOutput, CommandSpec, ProcessSignal, SystemOps};
use crate::paths::HotspotPaths;

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

pub struct MockSystemOps {
    calls: Mutex<Vec<String>>,
    handlers: Mutex<Vec<(String, Handler)>>,
    alive: Arc<Mutex<HashSet<i32>>>,
    missing_tools: Mutex<HashSet<String>>,
    slept: Mutex<Duration>,
}

impl Default for MockSystemOps {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSystemOps {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            alive: Arc::new(Mutex::new(HashSet::new())),
            missing_tools: Mutex::new(HashSet::new()),
            slept: Mutex::new(Duration::ZERO),
        }
    }

    /// Answers every command whose rendered line starts with `prefix`.
    /// The most recently registered matching handler wins.
    pub fn on<F>(&self, prefix: &str, handler: F)
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .push((prefix.to_string(), Box::new(handler)));
    }

    pub fn respond(&self, prefix: &str, output: CommandOutput) {
        self.on(prefix, move |_| output.clone());
    }

    pub fn set_alive(&self, pid: i32) {
        self.alive.lock().unwrap().insert(pid);
    }

    pub fn kill_now(&self, pid: i32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn is_alive(&self, pid: i32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    /// Shared live-pid set, for handlers that simulate daemons.
    pub fn alive_handle(&self) -> Arc<Mutex<HashSet<i32>>> {
        Arc::clone(&self.alive)
    }

    pub fn set_missing(&self, tool: &str) {
        self.missing_tools.lock().unwrap().insert(tool.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn ran(&self, line: &str) -> bool {
        self.calls().iter().any(|c| c == line)
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn total_sleep(&self) -> Duration {
        *self.slept.lock().unwrap()
    }

    fn dispatch(&self, cmd: &CommandSpec) -> CommandOutput {
        let line = cmd.to_string();
        self.calls.lock().unwrap().push(line.clone());
        if self.missing_tools.lock().unwrap().contains(cmd.program()) {
            return CommandOutput::failed(crate::exec::EXIT_NOT_FOUND);
        }
        let handlers = self.handlers.lock().unwrap();
        handlers
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, handler)| handler(cmd))
            .unwrap_or_default()
    }
}

impl SystemOps for MockSystemOps {
    fn run_capturing(&self, cmd: &CommandSpec) -> CommandOutput {
        self.dispatch(cmd)
    }

    fn run_silent(&self, cmd: &CommandSpec) -> i32 {
        self.dispatch(cmd).status
    }

    fn signal(&self, pid: i32, signal: ProcessSignal) -> bool {
        let mut alive = self.alive.lock().unwrap();
        match signal {
            ProcessSignal::Probe => alive.contains(&pid),
            ProcessSignal::Terminate | ProcessSignal::Kill => alive.remove(&pid),
        }
    }

    fn tool_available(&self, tool: &str) -> bool {
        !self.missing_tools.lock().unwrap().contains(tool)
    }

    fn sleep(&self, duration: Duration) {
        *self.slept.lock().unwrap() += duration;
    }
}

/// Scripts hostapd: a launch whose generated config satisfies `accept`
/// daemonizes as `pid`; any other launch writes `failure_log` and exits 1.
pub fn fake_hostapd<F>(ops: &MockSystemOps, paths: &HotspotPaths, pid: i32, accept: F, failure_log: &str)
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    let conf = paths.hostapd_conf.clone();
    let log = paths.hostapd_log.clone();
    let failure_log = failure_log.to_string();
    let alive = ops.alive_handle();
    ops.on("hostapd -B", move |_| {
        let contents = fs::read_to_string(&conf).unwrap_or_default();
        if accept(&contents) {
            alive.lock().unwrap().insert(pid);
            CommandOutput::ok("")
        } else {
            fs::write(&log, &failure_log).unwrap();
            CommandOutput::failed(1)
        }
    });

    let pattern = paths.hostapd_conf.display().to_string();
    let alive = ops.alive_handle();
    ops.on(&format!("pgrep -f {pattern}"), move |_| {
        if alive.lock().unwrap().contains(&pid) {
            CommandOutput::ok(format!("{pid}\n"))
        } else {
            CommandOutput::failed(1)
        }
    });
}

/// Scripts dnsmasq: writes `pid` to the pid file and marks it alive.
pub fn fake_dnsmasq(ops: &MockSystemOps, paths: &HotspotPaths, pid: i32) {
    let pid_file = paths.dnsmasq_pid.clone();
    let alive = ops.alive_handle();
    ops.on("dnsmasq -C", move |_| {
        fs::write(&pid_file, format!("{pid}\n")).unwrap();
        alive.lock().unwrap().insert(pid);
        CommandOutput::ok("")
    });
}
