use std::ffi::OsString;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::common::shell::{command_line, run_bounded};
use crate::ui::prelude::*;

pub trait FfmpegRunner {
    /// Run ffmpeg with `args`; a non-zero exit is an error carrying ffmpeg's diagnostics.
    fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFfmpegRunner;

#[derive(Debug, Clone)]
pub struct FfmpegRunOptions {
    pub timeout: Duration,
    /// Shown next to the spinner while ffmpeg runs
    pub label: String,
}

impl FfmpegRunOptions {
    pub fn new(timeout: Duration, label: impl Into<String>) -> Self {
        Self {
            timeout,
            label: label.into(),
        }
    }
}

impl FfmpegRunner for SystemFfmpegRunner {
    fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()> {
        let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
        emit(
            Level::Debug,
            "ffmpeg.command",
            &command_line("ffmpeg", &os_args),
            None,
        );

        let output = run_bounded("ffmpeg", &os_args, options.timeout, &options.label)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "ffmpeg exited with status {:?}: {}",
                output.status.code(),
                diagnostic(&stderr)
            );
        }
        Ok(())
    }
}

/// Error lines from ffmpeg's stderr, or its last line when none mentions an error.
pub fn diagnostic(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let error_lines: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| line.contains("error") || line.contains("Error") || line.contains("ERROR"))
        .collect();

    if error_lines.is_empty() {
        lines.last().copied().unwrap_or("no output").to_string()
    } else {
        error_lines.join("\n")
    }
}
