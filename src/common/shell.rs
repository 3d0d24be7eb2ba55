//! Shell and subprocess helpers
//!
//! Every external tool the engine drives (ffmpeg, ffprobe, WhisperX) runs
//! through [`run_bounded`], which polls the child until it exits or the
//! deadline passes.

use std::ffi::OsString;
use std::process::Output;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use duct::cmd;

use crate::common::progress::create_spinner;
use crate::ui::prelude::*;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Escape a string for use in a shell command
///
/// Quotes only when the string contains characters with special meaning in the
/// shell, using single quotes.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }

    if s.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '=' | '/' | '.' | ':' | ','))
    {
        return s.to_string();
    }

    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Printable command line, used for debug output and dry runs.
pub fn command_line(program: &str, args: &[OsString]) -> String {
    let mut parts = vec![shell_quote(program)];
    parts.extend(args.iter().map(|arg| shell_quote(&arg.to_string_lossy())));
    parts.join(" ")
}

/// Run `program` with captured output, killing it once `timeout` elapses.
///
/// The returned output may carry a non-zero status; callers decide what a
/// failure means for them.
pub fn run_bounded(
    program: &str,
    args: &[OsString],
    timeout: Duration,
    message: &str,
) -> Result<Output> {
    let handle = cmd(program, args)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .start()
        .with_context(|| format!("Failed to spawn {program}"))?;

    let spinner = create_spinner(message.to_string());
    let deadline = Instant::now() + timeout;

    loop {
        let finished = handle
            .try_wait()
            .with_context(|| format!("Failed to poll {program}"))?;
        if let Some(output) = finished {
            spinner.finish_and_clear();
            return Ok(output.clone());
        }

        if Instant::now() >= deadline {
            spinner.finish_and_clear();
            if let Err(err) = handle.kill() {
                emit(
                    Level::Debug,
                    "shell.kill_failed",
                    &format!("Failed to terminate {program} after timeout: {err}"),
                    None,
                );
            }
            bail!(
                "{program} did not finish within {}s and was terminated",
                timeout.as_secs()
            );
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Last meaningful stderr lines of a failed tool, for diagnostics.
pub fn stderr_tail(output: &Output, max_lines: usize) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
