// Subprocess runner for OS tooling (netstat, networksetup, iw, route, ip).

use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio::time::{Duration, timeout};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: ExitStatus },
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
}

/// Runs `program` and returns its stdout as (lossy) UTF-8.
///
/// stdout and stderr are read to the end before the exit status is awaited,
/// so large outputs cannot fill the pipe and stall the child.
pub async fn run_capture(
    program: &str,
    args: &[String],
    limit: Duration,
) -> Result<String, CommandError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Launch {
            program: program.to_string(),
            source,
        })?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| CommandError::Timeout {
            program: program.to_string(),
            secs: limit.as_secs(),
        })?
        .map_err(|source| CommandError::Launch {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(CommandError::Exit {
            program: program.to_string(),
            status: output.status,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Fire-and-forget variant: output is discarded and failures only logged.
pub async fn run_quiet(program: &str, args: &[String], limit: Duration) {
    if let Err(e) = run_capture(program, args, limit).await {
        tracing::debug!(error = %e, program, "command failed");
    }
}

/// Convenience for literal argument lists.
pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
