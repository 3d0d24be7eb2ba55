//! WhisperX transcription through `uvx`

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use super::SpeechRecognizer;
use crate::common::shell::{run_bounded, stderr_tail};
use crate::ui::prelude::*;
use crate::video::config::EngineConfig;
use crate::video::subtitles::RecognizedSegment;

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: Option<f64>,
    end: Option<f64>,
    #[serde(default)]
    text: String,
}

/// Recognizer handle, resolved once and shared by every item of a run.
#[derive(Debug, Clone)]
pub struct WhisperRecognizer {
    uvx: PathBuf,
    model: String,
    device: String,
    compute_type: String,
    timeout: Duration,
}

impl WhisperRecognizer {
    pub fn load(config: &EngineConfig) -> Result<Self> {
        let uvx = which::which("uvx")
            .context("uvx is required to run WhisperX; install uv from https://docs.astral.sh/uv/")?;
        emit(
            Level::Debug,
            "speech.whisper.loaded",
            &format!("WhisperX model {} via {}", config.whisper_model, uvx.display()),
            None,
        );
        Ok(Self {
            uvx,
            model: config.whisper_model.clone(),
            device: config.whisper_device.clone(),
            compute_type: config.whisper_compute_type.clone(),
            timeout: EngineConfig::timeout(config.transcribe_timeout_secs),
        })
    }

    fn args(&self, audio: &Path, output_dir: &Path, language: &str) -> Vec<OsString> {
        vec![
            OsString::from("whisperx"),
            audio.as_os_str().to_os_string(),
            OsString::from("--output_format"),
            OsString::from("json"),
            OsString::from("--output_dir"),
            output_dir.as_os_str().to_os_string(),
            OsString::from("--language"),
            OsString::from(language),
            OsString::from("--model"),
            OsString::from(&self.model),
            OsString::from("--device"),
            OsString::from(&self.device),
            OsString::from("--compute_type"),
            OsString::from(&self.compute_type),
        ]
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn transcribe(&self, audio: &Path, language: &str) -> Result<Vec<RecognizedSegment>> {
        let output_dir = tempfile::tempdir().context("Failed to create transcription directory")?;
        let program = self.uvx.to_string_lossy();

        let output = run_bounded(
            &program,
            &self.args(audio, output_dir.path(), language),
            self.timeout,
            "Transcribing voice-over",
        )
        .with_context(|| format!("Failed to run WhisperX for {}", audio.display()))?;

        if !output.status.success() {
            bail!(
                "WhisperX failed for {}: {}",
                audio.display(),
                stderr_tail(&output, 5)
            );
        }

        let stem = audio
            .file_stem()
            .with_context(|| format!("{} has no file name", audio.display()))?;
        let json_path = output_dir
            .path()
            .join(stem)
            .with_extension("json");
        let json = fs::read_to_string(&json_path).with_context(|| {
            format!(
                "WhisperX did not produce the expected transcript at {}",
                json_path.display()
            )
        })?;

        parse_whisper_json(&json)
    }
}

/// Timed segments from WhisperX JSON, dropping entries without usable timing.
pub fn parse_whisper_json(json: &str) -> Result<Vec<RecognizedSegment>> {
    let output: WhisperOutput =
        serde_json::from_str(json).context("Failed to parse WhisperX JSON output")?;

    let mut segments: Vec<RecognizedSegment> = output
        .segments
        .into_iter()
        .filter_map(|segment| {
            let (start, end) = (segment.start?, segment.end?);
            (start.is_finite() && end.is_finite() && end >= start && start >= 0.0)
                .then(|| RecognizedSegment::new(start, end, segment.text.trim()))
        })
        .collect();

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(segments)
}
