//! Read-only external commands (`pgbench --version`, `docker logs`)

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::TargetError;

/// Output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// First non-empty line of stdout, falling back to stderr
    pub fn first_line(&self) -> &str {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }
}

/// Runs `program` to completion and fails on a non-zero exit status
///
/// The child is killed when the returned future is dropped, so an outer
/// timeout or cancellation never leaves it running.
pub async fn run(program: &str, args: &[String]) -> Result<CommandOutput, TargetError> {
    debug!(program, ?args, "running command");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| TargetError::Command {
            program: program.to_string(),
            detail: e.to_string(),
        })?;

    let captured = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if output.status.success() {
        Ok(captured)
    } else {
        let detail = match captured.first_line() {
            "" => format!("exited with {}", output.status),
            line => format!("exited with {}: {}", output.status, line),
        };
        Err(TargetError::Command {
            program: program.to_string(),
            detail,
        })
    }
}
