use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::common::shell::{run_bounded, stderr_tail};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn probe_duration_seconds(path: &Path) -> Result<f64> {
    let args: Vec<OsString> = vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.as_os_str().to_os_string(),
    ];
    let output = run_bounded("ffprobe", &args, PROBE_TIMEOUT, "Probing duration")
        .with_context(|| format!("Failed to run ffprobe for {}", path.display()))?;

    if !output.status.success() {
        bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            stderr_tail(&output, 3)
        );
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(stdout: &str) -> Result<f64> {
    let duration: f64 = stdout
        .trim()
        .parse()
        .context("Failed to parse ffprobe duration as f64")?;
    if !duration.is_finite() || duration <= 0.0 {
        bail!("ffprobe reported an unusable duration: {duration}");
    }
    Ok(duration)
}
