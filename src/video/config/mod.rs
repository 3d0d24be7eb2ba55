use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// Import macro from crate root (#[macro_export] places it there)
use crate::common::config::DocumentedConfig;
use crate::common::paths;
use crate::documented_config;
use crate::video::model::{ContentFormat, VoiceEngine};
use crate::video::subtitles::AlignmentParams;

/// Corner used for the text watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Google voices rotated across batch items by default.
const BATCH_VOICES: [&str; 6] = [
    "fr-FR-Neural2-B",
    "fr-FR-Neural2-D",
    "fr-FR-Wavenet-B",
    "fr-FR-Neural2-A",
    "fr-FR-Neural2-C",
    "fr-FR-Wavenet-A",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub output_dir: PathBuf,
    /// Pre-seeded background clips, matched by filename keywords
    pub assets_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub video_width: u32,
    pub video_height: u32,

    pub language: String,
    pub whisper_model: String,
    pub whisper_device: String,
    pub whisper_compute_type: String,

    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_max_tokens: u32,

    pub voice_engine: VoiceEngine,
    pub google_tts_api_key: Option<String>,
    pub google_voice_name: String,
    pub tts_language_code: String,
    pub tts_pitch: f64,

    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub elevenlabs_model: String,
    /// Google voices rotated across batch items; empty means always the default voice
    pub batch_voices: Vec<String>,
    pub speaking_rate: f64,

    pub pexels_api_key: Option<String>,
    pub stock_cache_enabled: bool,
    pub stock_cache_max_videos: usize,

    pub retry_enabled: bool,
    pub retry_max_attempts: usize,
    pub retry_backoff_seconds: f64,
    pub script_max_attempts: usize,

    pub caption_snap_threshold: f64,
    pub caption_fallback_duration: f64,

    pub watermark_enabled: bool,
    pub watermark_text: Option<String>,
    pub watermark_position: WatermarkPosition,
    pub watermark_font_size: u32,

    pub synthesis_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub encode_timeout_secs: u64,
    pub transcribe_timeout_secs: u64,

    pub output_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: paths::default_output_dir(),
            assets_dir: paths::default_assets_dir(),
            cache_dir: paths::default_cache_dir(),
            video_width: 1080,
            video_height: 1920,
            language: "fr".to_string(),
            whisper_model: "medium".to_string(),
            whisper_device: "cpu".to_string(),
            whisper_compute_type: "int8".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_max_tokens: 1024,
            voice_engine: VoiceEngine::default(),
            google_tts_api_key: None,
            google_voice_name: "fr-FR-Neural2-B".to_string(),
            tts_language_code: "fr-FR".to_string(),
            tts_pitch: 0.0,
            elevenlabs_api_key: None,
            elevenlabs_voice_id: None,
            elevenlabs_model: "eleven_multilingual_v2".to_string(),
            batch_voices: BATCH_VOICES.iter().map(|voice| voice.to_string()).collect(),
            speaking_rate: 1.0,
            pexels_api_key: None,
            stock_cache_enabled: true,
            stock_cache_max_videos: 20,
            retry_enabled: true,
            retry_max_attempts: 3,
            retry_backoff_seconds: 2.0,
            script_max_attempts: 3,
            caption_snap_threshold: 1.0,
            caption_fallback_duration: 30.0,
            watermark_enabled: false,
            watermark_text: None,
            watermark_position: WatermarkPosition::default(),
            watermark_font_size: 36,
            synthesis_timeout_secs: 120,
            generation_timeout_secs: 60,
            search_timeout_secs: 15,
            download_timeout_secs: 120,
            encode_timeout_secs: 300,
            transcribe_timeout_secs: 600,
            output_prefix: "noradar".to_string(),
        }
    }
}

documented_config!(EngineConfig {
    fields: [
        output_dir, "Root for scripts, audio, subtitles and videos",
        assets_dir, "Pre-seeded background clips matched by filename keywords",
        cache_dir, "Stock clip cache and render scratch directory",
        video_width, "Output width in pixels",
        video_height, "Output height in pixels",
        language, "Spoken language passed to the recognizer",
        whisper_model, "WhisperX model name",
        whisper_device, "WhisperX device (cpu or cuda)",
        whisper_compute_type, "WhisperX compute type",
        gemini_model, "Gemini model used for script generation",
        gemini_max_tokens, "Maximum output tokens per generation",
        voice_engine, "Default voice engine (google or elevenlabs; elevenlabs falls back to google)",
        google_voice_name, "Default Google TTS voice",
        tts_language_code, "Language code sent to Google TTS",
        tts_pitch, "Google TTS pitch in semitones",
        elevenlabs_model, "ElevenLabs model id",
        batch_voices, "Google voices rotated across batch items",
        speaking_rate, "Speaking rate sent to Google TTS and used for duration estimates",
        stock_cache_enabled, "Keep downloaded stock clips for reuse",
        stock_cache_max_videos, "Maximum cached clips per category",
        retry_enabled, "Retry transient service failures",
        retry_max_attempts, "Attempts per external call, including the first",
        retry_backoff_seconds, "Initial backoff delay, doubled on each retry",
        script_max_attempts, "Attempts to obtain a usable script from the generator",
        caption_snap_threshold, "Snap a cue start to a spoken segment closer than this (seconds)",
        caption_fallback_duration, "Caption span assumed when transcription yields nothing (seconds)",
        watermark_enabled, "Draw the watermark text over the video",
        watermark_position, "Watermark corner (top_left, top_right, bottom_left, bottom_right)",
        watermark_font_size, "Watermark font size",
        synthesis_timeout_secs, "Timeout for a speech synthesis request",
        generation_timeout_secs, "Timeout for a script generation request",
        search_timeout_secs, "Timeout for a stock search request",
        download_timeout_secs, "Timeout for a stock clip download",
        encode_timeout_secs, "Timeout for a single ffmpeg encode",
        transcribe_timeout_secs, "Timeout for a transcription run",
        output_prefix, "Prefix of rendered video filenames",
    ],
    optional: [
        gemini_api_key, "Gemini API key (or GEMINI_API_KEY)",
        google_tts_api_key, "Google Cloud Text-to-Speech API key (or GOOGLE_TTS_API_KEY)",
        elevenlabs_api_key, "ElevenLabs API key (or ELEVENLABS_API_KEY)",
        elevenlabs_voice_id, "Default ElevenLabs voice id",
        pexels_api_key, "Pexels API key for stock backgrounds (or PEXELS_API_KEY)",
        watermark_text, "Watermark text, e.g. @noradar",
    ],
    config_path: paths::engine_config_file(),
});

impl EngineConfig {
    /// Load the user config, creating a documented default on first run.
    pub fn load() -> Result<Self> {
        let path = <Self as DocumentedConfig>::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = <Self as DocumentedConfig>::load_from_path_documented(path)?;
        config.apply_env_overrides();
        config.sanitize();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        override_from_env(&mut self.gemini_api_key, "GEMINI_API_KEY");
        override_from_env(&mut self.google_tts_api_key, "GOOGLE_TTS_API_KEY");
        override_from_env(&mut self.elevenlabs_api_key, "ELEVENLABS_API_KEY");
        override_from_env(&mut self.elevenlabs_voice_id, "ELEVENLABS_VOICE_ID");
        override_from_env(&mut self.pexels_api_key, "PEXELS_API_KEY");
    }

    fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.speaking_rate.is_finite() || self.speaking_rate <= 0.0 {
            self.speaking_rate = defaults.speaking_rate;
        }
        if !self.tts_pitch.is_finite() {
            self.tts_pitch = defaults.tts_pitch;
        }
        self.tts_pitch = self.tts_pitch.clamp(-20.0, 20.0);
        if !self.caption_snap_threshold.is_finite() || self.caption_snap_threshold < 0.0 {
            self.caption_snap_threshold = defaults.caption_snap_threshold;
        }
        if !self.caption_fallback_duration.is_finite() || self.caption_fallback_duration <= 0.0 {
            self.caption_fallback_duration = defaults.caption_fallback_duration;
        }
        if !self.retry_backoff_seconds.is_finite() || self.retry_backoff_seconds < 0.0 {
            self.retry_backoff_seconds = defaults.retry_backoff_seconds;
        }
        self.retry_max_attempts = self.retry_max_attempts.max(1);
        self.script_max_attempts = self.script_max_attempts.max(1);
        if self.video_width == 0 || self.video_height == 0 {
            self.video_width = defaults.video_width;
            self.video_height = defaults.video_height;
        }
    }

    pub fn alignment_params(&self) -> AlignmentParams {
        AlignmentParams {
            snap_threshold: self.caption_snap_threshold,
            fallback_duration: self.caption_fallback_duration,
            ..AlignmentParams::default()
        }
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.video_width, self.video_height)
    }

    /// Watermark text when enabled and non-empty.
    pub fn watermark(&self) -> Option<&str> {
        if !self.watermark_enabled {
            return None;
        }
        self.watermark_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Default voice of `engine`; empty when none is configured.
    pub fn default_voice(&self, engine: VoiceEngine) -> String {
        match engine {
            VoiceEngine::Google => self.google_voice_name.clone(),
            VoiceEngine::ElevenLabs => self.elevenlabs_voice_id.clone().unwrap_or_default(),
        }
    }

    /// Voices available to batch rotation. The rotation list names Google
    /// voices, so ElevenLabs batches keep their single configured voice.
    pub fn voice_pool(&self, engine: VoiceEngine) -> Vec<String> {
        if engine == VoiceEngine::Google && !self.batch_voices.is_empty() {
            return self.batch_voices.clone();
        }
        let voice = self.default_voice(engine);
        if voice.trim().is_empty() {
            Vec::new()
        } else {
            vec![voice]
        }
    }

    pub fn timeout(secs: u64) -> Duration {
        Duration::from_secs(secs.max(1))
    }

    pub fn directories(&self) -> OutputDirectories {
        OutputDirectories {
            scripts: self.output_dir.join("scripts"),
            audio: self.output_dir.join("audio"),
            subtitles: self.output_dir.join("subtitles"),
            videos: self.output_dir.join("videos"),
            work: self.cache_dir.join("work"),
            stock_cache: self.cache_dir.join("backgrounds"),
            assets: self.assets_dir.clone(),
        }
    }
}

fn override_from_env(field: &mut Option<String>, var: &str) {
    if let Ok(value) = env::var(var) {
        let value = value.trim();
        if !value.is_empty() {
            *field = Some(value.to_string());
        }
    }
}

/// Resolved on-disk layout of every produced artifact.
#[derive(Debug, Clone)]
pub struct OutputDirectories {
    pub scripts: PathBuf,
    pub audio: PathBuf,
    pub subtitles: PathBuf,
    pub videos: PathBuf,
    /// Scratch files (prepared backgrounds, ASS tracks)
    pub work: PathBuf,
    pub stock_cache: PathBuf,
    pub assets: PathBuf,
}

impl OutputDirectories {
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.scripts,
            &self.audio,
            &self.subtitles,
            &self.videos,
            &self.work,
            &self.stock_cache,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn script_path(&self, format: ContentFormat, id: &str) -> PathBuf {
        self.scripts.join(format!("{format}_{id}.json"))
    }

    pub fn audio_path(&self, format: ContentFormat, id: &str) -> PathBuf {
        self.audio.join(format!("{format}_{id}.mp3"))
    }

    pub fn srt_path(&self, id: &str) -> PathBuf {
        self.subtitles.join(format!("{id}.srt"))
    }

    pub fn ass_path(&self, id: &str) -> PathBuf {
        self.work.join(format!("{id}.ass"))
    }

    pub fn prepared_background_path(&self, id: &str) -> PathBuf {
        self.work.join(format!("{id}_bg.mp4"))
    }

    pub fn video_path(&self, prefix: &str, format: ContentFormat, id: &str) -> PathBuf {
        self.videos.join(format!("{prefix}_{format}_{id}.mp4"))
    }

    pub fn stock_cache_for(&self, format: ContentFormat) -> PathBuf {
        self.stock_cache.join(format.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn first_load_writes_documented_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = EngineConfig::load_from(&path).unwrap();

        assert_eq!(config.video_width, 1080);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("retry_max_attempts = 3  # Attempts per external call"));
        assert!(written.contains("# pexels_api_key = \"\""));
    }

    #[test]
    #[serial]
    fn file_values_and_env_keys_are_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "caption_snap_threshold = 0.5\nwatermark_position = \"top_left\"\npexels_api_key = \"from-file\"\n",
        )
        .unwrap();

        unsafe { env::set_var("PEXELS_API_KEY", "from-env") };
        let config = EngineConfig::load_from(&path);
        unsafe { env::remove_var("PEXELS_API_KEY") };
        let config = config.unwrap();

        assert_eq!(config.alignment_params().snap_threshold, 0.5);
        assert_eq!(config.watermark_position, WatermarkPosition::TopLeft);
        assert_eq!(config.pexels_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.stock_cache_max_videos, 20);
    }

    #[test]
    #[serial]
    fn voice_engine_and_google_key_are_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "voice_engine = \"elevenlabs\"\ntts_pitch = 90.0\n").unwrap();

        unsafe { env::set_var("GOOGLE_TTS_API_KEY", "google-env") };
        let config = EngineConfig::load_from(&path);
        unsafe { env::remove_var("GOOGLE_TTS_API_KEY") };
        let config = config.unwrap();

        assert_eq!(config.voice_engine, VoiceEngine::ElevenLabs);
        assert_eq!(config.google_tts_api_key.as_deref(), Some("google-env"));
        assert_eq!(config.tts_pitch, 20.0);
    }

    #[test]
    fn voice_pool_depends_on_engine() {
        let mut config = EngineConfig::default();
        assert_eq!(config.voice_pool(VoiceEngine::Google).len(), 6);
        assert!(config.voice_pool(VoiceEngine::ElevenLabs).is_empty());

        config.elevenlabs_voice_id = Some("rachel".to_string());
        assert_eq!(config.voice_pool(VoiceEngine::ElevenLabs), vec!["rachel"]);

        config.batch_voices.clear();
        assert_eq!(config.voice_pool(VoiceEngine::Google), vec!["fr-FR-Neural2-B"]);
    }

    #[test]
    fn watermark_requires_flag_and_text() {
        let mut config = EngineConfig {
            watermark_text: Some("  @noradar ".to_string()),
            ..EngineConfig::default()
        };
        assert_eq!(config.watermark(), None);
        config.watermark_enabled = true;
        assert_eq!(config.watermark(), Some("@noradar"));
    }

    #[test]
    fn artifact_paths_follow_naming_scheme() {
        let config = EngineConfig {
            output_dir: PathBuf::from("/out"),
            cache_dir: PathBuf::from("/cache"),
            ..EngineConfig::default()
        };
        let dirs = config.directories();

        assert_eq!(
            dirs.video_path("noradar", ContentFormat::Tuto, "abcd1234"),
            PathBuf::from("/out/videos/noradar_tuto_abcd1234.mp4")
        );
        assert_eq!(
            dirs.script_path(ContentFormat::ChiffreChoc, "abcd1234"),
            PathBuf::from("/out/scripts/chiffre_choc_abcd1234.json")
        );
        assert_eq!(dirs.srt_path("abcd1234"), PathBuf::from("/out/subtitles/abcd1234.srt"));
        assert_eq!(
            dirs.stock_cache_for(ContentFormat::Mythe),
            PathBuf::from("/cache/backgrounds/mythe")
        );
    }
}
