//! External command execution
//!
//! Every OS query in this crate goes through [`CommandRunner`], so the collector and
//! the traffic-control operations can be driven by [`ScriptedRunner`] in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{NetError, Result};

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful run with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed run with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stderr if present, otherwise stdout, trimmed
    pub fn message(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs an external program to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args...`, failing with [`NetError::Timeout`] after `timeout`.
    ///
    /// A non-zero exit is *not* an error here; callers inspect `exit_code`.
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput>;
}

/// Shared runner handle
pub type SharedRunner = Arc<dyn CommandRunner>;

/// Runs real processes via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let command_line = render(program, args);
        debug!(command = %command_line, timeout = ?timeout, "Running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| NetError::Timeout {
                command: command_line.clone(),
                timeout,
            })?
            .map_err(|source| NetError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %command_line, exit_code = result.exit_code, "Command finished");
        Ok(result)
    }
}

/// In-memory runner answering from a table keyed by the full command line.
///
/// Unknown commands exit 1 with `Device "<last arg>" does not exist.`, which is
/// what `ip`/`tc` print for a missing interface.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    timeouts: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command_line` with `output` every time it is run
    pub fn on(&self, command_line: &str, output: CommandOutput) -> &Self {
        lock(&self.responses).insert(command_line.to_string(), output);
        self
    }

    /// Answer `command_line` with a successful run printing `stdout`
    pub fn on_ok(&self, command_line: &str, stdout: &str) -> &Self {
        self.on(command_line, CommandOutput::ok(stdout))
    }

    /// Make `command_line` time out
    pub fn on_timeout(&self, command_line: &str) -> &Self {
        lock(&self.timeouts).push(command_line.to_string());
        self
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Command lines run so far that start with `prefix`
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let command_line = render(program, args);
        lock(&self.calls).push(command_line.clone());

        if lock(&self.timeouts).contains(&command_line) {
            return Err(NetError::Timeout {
                command: command_line,
                timeout,
            });
        }

        let scripted = lock(&self.responses).get(&command_line).cloned();
        Ok(scripted.unwrap_or_else(|| {
            let device = args.last().copied().unwrap_or(program);
            CommandOutput::failed(1, format!("Device \"{}\" does not exist.\n", device))
        }))
    }
}

fn render(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
