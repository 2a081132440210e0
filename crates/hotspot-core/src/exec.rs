//! Command execution boundary.
//!
//! Every external effect (interface creation, network-manager commands,
//! daemon launch, NAT rules) goes through [`SystemOps`]. A missing binary is
//! reported as a failed command, never as an error.

use std::fmt;
use std::process::{Command, Stdio};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

/// Exit status reported when the program could not be spawned at all.
pub const EXIT_NOT_FOUND: i32 = 127;

/// A program plus its arguments. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub status: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            status: 0,
        }
    }

    pub fn failed(status: i32) -> Self {
        Self {
            stdout: String::new(),
            status,
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Signals the orchestrator sends to supervised daemons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// Signal zero: liveness probe only
    Probe,
    Terminate,
    Kill,
}

impl ProcessSignal {
    fn as_nix(self) -> Option<Signal> {
        match self {
            ProcessSignal::Probe => None,
            ProcessSignal::Terminate => Some(Signal::SIGTERM),
            ProcessSignal::Kill => Some(Signal::SIGKILL),
        }
    }
}

pub trait SystemOps: Send + Sync {
    /// Runs to completion, capturing stdout. stderr is discarded.
    fn run_capturing(&self, cmd: &CommandSpec) -> CommandOutput;

    /// Runs to completion with all output discarded; returns the exit status.
    fn run_silent(&self, cmd: &CommandSpec) -> i32;

    /// Delivers `signal` to `pid`; true when the kernel accepted it.
    fn signal(&self, pid: i32, signal: ProcessSignal) -> bool;

    /// Whether `tool` resolves on the search path.
    fn tool_available(&self, tool: &str) -> bool;

    /// Settle delay between steps that wait on another daemon.
    fn sleep(&self, duration: Duration);
}

pub struct RealSystemOps;

impl SystemOps for RealSystemOps {
    fn run_capturing(&self, cmd: &CommandSpec) -> CommandOutput {
        debug!("exec: {cmd}");
        match Command::new(cmd.program())
            .args(cmd.arguments())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                status: output.status.code().unwrap_or(-1),
            },
            Err(err) => {
                debug!("exec {} failed to spawn: {}", cmd.program(), err);
                CommandOutput::failed(EXIT_NOT_FOUND)
            }
        }
    }

    fn run_silent(&self, cmd: &CommandSpec) -> i32 {
        debug!("exec: {cmd}");
        match Command::new(cmd.program())
            .args(cmd.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => status.code().unwrap_or(-1),
            Err(err) => {
                debug!("exec {} failed to spawn: {}", cmd.program(), err);
                EXIT_NOT_FOUND
            }
        }
    }

    fn signal(&self, pid: i32, signal: ProcessSignal) -> bool {
        // pid 0 and negative pids address process groups
        if pid <= 0 {
            return false;
        }
        kill(Pid::from_raw(pid), signal.as_nix()).is_ok()
    }

    fn tool_available(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
