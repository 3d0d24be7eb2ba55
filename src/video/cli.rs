use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

use super::model::{ContentFormat, VoiceEngine};

#[derive(Subcommand, Debug, Clone)]
pub enum EngineCommands {
    /// Write the documented config file and show which credentials are set
    Init,
    /// Produce one video (script, voice-over, captions, background, render)
    Produce(ProduceArgs),
    /// Produce several videos in a row; failed items are reported, not fatal
    Batch(BatchArgs),
    /// Align a script onto recognizer segments and write SRT/ASS tracks
    Align(AlignArgs),
    /// Show which background would be used for a format
    Background(BackgroundArgs),
    /// Count produced files per output directory
    Status,
    /// List the available content formats
    Formats,
}

#[derive(Args, Debug, Clone)]
pub struct ProduceArgs {
    /// Content format of the video
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: ContentFormat,

    /// Optional theme handed to the script generator
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,

    /// Use a saved script JSON instead of generating one
    #[arg(long = "script-file", value_hint = ValueHint::FilePath)]
    pub script_file: Option<PathBuf>,

    /// Still image to use as background instead of footage
    #[arg(short = 'b', long = "background", value_hint = ValueHint::FilePath)]
    pub background: Option<PathBuf>,

    /// Voice engine; elevenlabs falls back to google when it fails
    #[arg(long = "voice-engine", value_enum)]
    pub voice_engine: Option<VoiceEngine>,

    /// Voice overriding the engine's configured default
    #[arg(long)]
    pub voice: Option<String>,

    /// Only generate and save the script
    #[arg(long)]
    pub script_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Number of videos to produce
    #[arg(short = 'n', long = "count", default_value_t = 5)]
    pub count: usize,

    /// Formats to cycle through, in order (repeatable; defaults to all)
    #[arg(short = 'f', long = "format", value_enum)]
    pub formats: Vec<ContentFormat>,

    /// Optional theme handed to every script
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AlignArgs {
    /// Script to caption: plain text, or a saved script JSON
    #[arg(long = "script", value_hint = ValueHint::FilePath)]
    pub script: PathBuf,

    /// Recognized segments: WhisperX JSON, a JSON array of {start, end, text}, or an SRT file
    #[arg(long = "segments", value_hint = ValueHint::FilePath)]
    pub segments: Option<PathBuf>,

    /// SRT output path; defaults to the script path with an .srt extension
    #[arg(long = "out-srt", value_hint = ValueHint::FilePath)]
    pub out_srt: Option<PathBuf>,

    /// Also write the styled ASS track to this path
    #[arg(long = "out-ass", value_hint = ValueHint::FilePath)]
    pub out_ass: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BackgroundArgs {
    /// Content format to resolve a background for
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: ContentFormat,

    /// Video duration in seconds
    #[arg(short = 'd', long = "duration", default_value_t = 30.0)]
    pub duration: f64,
}
