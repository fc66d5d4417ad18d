// src/executor/runner.rs

//! Running external commands for install steps
//!
//! The executor only sees a [`RunOutcome`]; how a command is run is up to
//! the [`CommandRunner`]. [`SystemRunner`] spawns real processes and
//! [`DryRunRunner`] only logs them.

use super::cancel::CancelToken;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// How often a running child is checked for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// SIGINT; a terminal Ctrl-C reaches the child along with our handler
#[cfg(unix)]
const SIGINT: i32 = 2;

/// A fully substituted command ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Step name, for logging and errors
    pub step: String,
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    /// Added to the inherited environment
    pub env: BTreeMap<String, String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of running one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exited with status 0
    Success,
    /// Non-zero exit, death by signal (`None`), or the program could not be started
    Failed { status: Option<i32> },
    /// Stopped by cancellation, or the child died from an interrupt
    Cancelled,
}

impl RunOutcome {
    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            Self::Success
        } else {
            Self::Failed {
                status: status.code(),
            }
        }
    }
}

/// Runs step commands on behalf of the executor
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<RunOutcome>;

    /// Whether commands only pretend to run
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Spawns each command as a child process and waits for it
///
/// Stdout and stderr are inherited; stdin is null.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    poll_interval: Duration,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Set how often the child is polled for cancellation
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<RunOutcome> {
        debug!(
            step = %invocation.step,
            workdir = %invocation.workdir.display(),
            "Command: {}",
            invocation
        );

        let mut child = match Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.workdir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(step = %invocation.step, "Failed to start {}: {}", invocation.program, e);
                return Ok(RunOutcome::Failed { status: None });
            }
        };

        loop {
            if cancel.is_cancelled() {
                warn!(step = %invocation.step, pid = child.id(), "Killing cancelled step");
                let _ = child.kill();
                let _ = child.wait();
                return Ok(RunOutcome::Cancelled);
            }

            let waited = match child.wait_timeout(self.poll_interval) {
                Ok(waited) => waited,
                Err(e) => {
                    warn!(step = %invocation.step, pid = child.id(), "Lost track of child: {}", e);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            };

            if let Some(status) = waited {
                debug!(step = %invocation.step, %status, "Command exited");
                // The child may die from the same interrupt that trips the token
                if cancel.is_cancelled() || interrupted(&status) {
                    return Ok(RunOutcome::Cancelled);
                }
                return Ok(RunOutcome::from_status(status));
            }
        }
    }
}

#[cfg(unix)]
fn interrupted(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(SIGINT)
}

#[cfg(not(unix))]
fn interrupted(_status: &ExitStatus) -> bool {
    false
}

/// Logs each command and reports success without running anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<RunOutcome> {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        info!(step = %invocation.step, "[dry-run] {}", invocation);
        Ok(RunOutcome::Success)
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
