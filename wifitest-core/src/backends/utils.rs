use crate::{Error, Result};
use std::io::ErrorKind;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Arguments that follow one of these flags are never written to logs.
const SECRET_FLAGS: [&str; 2] = ["password", "wifi-sec.psk"];

/// Runs an external program to completion, bounded by `limit`.
///
/// The child is killed if the deadline passes. A missing binary becomes
/// `Error::ToolNotFound`, an expired deadline `Error::Timeout`. A non-zero
/// exit status is *not* an error here; callers inspect `Output::status`.
pub async fn run_command(program: &str, args: &[&str], limit: Duration) -> Result<Output> {
    tracing::debug!(program, args = %redact(args), "running command");
    let child = Command::new(program).args(args).kill_on_drop(true).output();

    match tokio::time::timeout(limit, child).await {
        Ok(Ok(output)) => {
            tracing::debug!(program, status = ?output.status.code(), "command finished");
            Ok(output)
        }
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
            Err(Error::ToolNotFound(program.to_string()))
        }
        Ok(Err(e)) => Err(Error::Io(e)),
        Err(_) => Err(Error::Timeout {
            what: program.to_string(),
            after: limit,
        }),
    }
}

/// stderr of a finished command, falling back to stdout when stderr is empty.
pub fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Checks that `binary` can be spawned by running `<binary> --version`.
pub async fn verify_binary(binary: &str, display_name: &str, limit: Duration) -> Result<()> {
    match run_command(binary, &["--version"], limit).await {
        Ok(_) => Ok(()),
        Err(Error::ToolNotFound(_)) => Err(Error::ToolNotFound(format!(
            "{display_name} ('{binary}'). Please install {display_name} and ensure it's in your PATH"
        ))),
        Err(e) => Err(e),
    }
}

fn redact(args: &[&str]) -> String {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push("********");
            hide_next = false;
            continue;
        }
        hide_next = SECRET_FLAGS.contains(arg);
        out.push(*arg);
    }
    out.join(" ")
}
