//! Operator-configured shell commands
//!
//! The program is run directly (no shell interpolation). Arguments from the
//! chat message are appended after the configured ones.
//!
//! Stdout is split on blank lines; each paragraph becomes one reply.

use super::{CommandError, Execution};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Shown when a successful command prints nothing
const NO_OUTPUT: &str = "(no output)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub async fn run(&self, extra: &[String]) -> Execution {
        debug!(program = %self.program, ?extra, "running shell command");

        let child = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Execution::failed(vec![], CommandError::Spawn(e.to_string())),
            Err(_) => return Execution::failed(vec![], CommandError::TimedOut(self.timeout)),
        };

        let lines = paragraphs(&String::from_utf8_lossy(&output.stdout));

        if output.status.success() {
            if lines.is_empty() {
                return Execution::line(NO_OUTPUT);
            }
            return Execution::ok(lines);
        }

        Execution::failed(
            lines,
            CommandError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
        )
    }
}

fn paragraphs(stdout: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in stdout.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}
