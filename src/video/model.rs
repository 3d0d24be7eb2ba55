use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Content categories. Every per-category table in the engine is a match on
/// this enum, so adding a variant fails to compile until each table knows it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ContentFormat {
    Scandale,
    Tuto,
    Temoignage,
    Mythe,
    ChiffreChoc,
    UltraCourt,
    StoryPov,
    Debunk,
    CasReel,
    VraiFaux,
}

impl ContentFormat {
    pub const ALL: [ContentFormat; 10] = [
        ContentFormat::Scandale,
        ContentFormat::Tuto,
        ContentFormat::Temoignage,
        ContentFormat::Mythe,
        ContentFormat::ChiffreChoc,
        ContentFormat::UltraCourt,
        ContentFormat::StoryPov,
        ContentFormat::Debunk,
        ContentFormat::CasReel,
        ContentFormat::VraiFaux,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentFormat::Scandale => "scandale",
            ContentFormat::Tuto => "tuto",
            ContentFormat::Temoignage => "temoignage",
            ContentFormat::Mythe => "mythe",
            ContentFormat::ChiffreChoc => "chiffre_choc",
            ContentFormat::UltraCourt => "ultra_court",
            ContentFormat::StoryPov => "story_pov",
            ContentFormat::Debunk => "debunk",
            ContentFormat::CasReel => "cas_reel",
            ContentFormat::VraiFaux => "vrai_faux",
        }
    }

    /// Filename fragments that mark a pre-seeded clip as fitting this category.
    pub fn local_keywords(self) -> &'static [&'static str] {
        match self {
            ContentFormat::Scandale => &["road", "highway", "traffic", "radar"],
            ContentFormat::Tuto => &["document", "paper", "phone", "desk"],
            ContentFormat::Temoignage | ContentFormat::StoryPov | ContentFormat::CasReel => {
                &["happy", "relief", "car", "driver"]
            }
            ContentFormat::Mythe | ContentFormat::Debunk | ContentFormat::VraiFaux => {
                &["thinking", "question", "idea"]
            }
            ContentFormat::ChiffreChoc | ContentFormat::UltraCourt => {
                &["money", "euro", "wallet", "cash"]
            }
        }
    }

    /// Stock search queries; one is picked at random per search.
    pub fn stock_keywords(self) -> &'static [&'static str] {
        match self {
            ContentFormat::Scandale | ContentFormat::ChiffreChoc => &[
                "speed limit road sign",
                "highway traffic",
                "urban traffic timelapse",
            ],
            ContentFormat::Tuto | ContentFormat::UltraCourt => &[
                "car dashboard driving",
                "road driving pov",
                "car street night lights",
            ],
            ContentFormat::Temoignage | ContentFormat::StoryPov | ContentFormat::CasReel => &[
                "car driving highway",
                "driving rain windshield",
                "road driving pov",
            ],
            ContentFormat::Mythe | ContentFormat::Debunk | ContentFormat::VraiFaux => &[
                "traffic city night",
                "car street night lights",
                "urban traffic timelapse",
            ],
        }
    }

    /// Top and bottom colours of the generated fallback background.
    pub fn gradient_colors(self) -> (&'static str, &'static str) {
        match self {
            ContentFormat::Scandale => ("#FF4B4B", "#8B0000"),
            ContentFormat::Tuto => ("#4ECDC4", "#1A535C"),
            ContentFormat::Temoignage => ("#45B7D1", "#1E3A5F"),
            ContentFormat::Mythe => ("#9B59B6", "#4A235A"),
            ContentFormat::ChiffreChoc => ("#F39C12", "#7D4E00"),
            ContentFormat::UltraCourt
            | ContentFormat::StoryPov
            | ContentFormat::Debunk
            | ContentFormat::CasReel
            | ContentFormat::VraiFaux => ("#1A1A2E", "#16213E"),
        }
    }

    /// Upper bound on spoken words (hook + body + cta).
    pub fn max_words(self) -> usize {
        match self {
            ContentFormat::Mythe => 70,
            ContentFormat::ChiffreChoc => 60,
            ContentFormat::VraiFaux => 65,
            ContentFormat::UltraCourt => 45,
            _ => 85,
        }
    }

    /// One-line editorial direction handed to the script generator.
    pub fn brief(self) -> &'static str {
        match self {
            ContentFormat::Scandale => "Viral, indignant angle on a surprising fine.",
            ContentFormat::Tuto => "Show how simple the process is, step by step.",
            ContentFormat::Temoignage => "A first-person testimony with a happy ending.",
            ContentFormat::Mythe => "Debunk one common belief about fines.",
            ContentFormat::ChiffreChoc => "Open with a striking number.",
            ContentFormat::UltraCourt => "Fifteen seconds, one punchy idea.",
            ContentFormat::StoryPov => "Point-of-view story: received a fine, here is what I did.",
            ContentFormat::Debunk => "Reasons not to pay straight away, without revealing the method.",
            ContentFormat::CasReel => "A real case: the amount, the contest, the outcome.",
            ContentFormat::VraiFaux => "True or false question with an interactive hook.",
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speech synthesis backend used for the voice-over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEngine {
    #[default]
    Google,
    #[value(name = "elevenlabs")]
    ElevenLabs,
}

impl fmt::Display for VoiceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VoiceEngine::Google => "google",
            VoiceEngine::ElevenLabs => "elevenlabs",
        })
    }
}

/// Approved narration for one video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    #[serde(default = "new_item_id")]
    pub id: String,
    pub format: ContentFormat,
    pub title: String,
    pub hook: String,
    pub body: String,
    pub cta: String,
    /// Text read aloud in full by the synthesizer.
    pub full_text: String,
    #[serde(default = "default_duration_estimate")]
    pub duration_estimate: u32,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,
}

impl Script {
    pub fn filename(&self) -> String {
        format!("{}_{}.json", self.format, self.id)
    }

    pub fn word_count(&self) -> usize {
        self.full_text.split_whitespace().count()
    }
}

fn default_duration_estimate() -> u32 {
    25
}

/// Short random identifier shared by every artifact of one item.
pub fn new_item_id() -> String {
    format!("{:08x}", rand::thread_rng().r#gen::<u32>())
}

/// Voice-over written to disk.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration: f64,
    pub voice: String,
    /// Engine that actually produced the audio, after any fallback.
    pub engine: VoiceEngine,
}

/// Finished render with every intermediate artifact of the item.
#[derive(Debug, Clone)]
pub struct RenderedVideo {
    pub script: Script,
    pub audio: AudioTrack,
    pub srt_path: PathBuf,
    pub video_path: PathBuf,
    /// Filename of the background source, as recorded for batch de-duplication.
    pub background: String,
    pub used_fallback_render: bool,
}
