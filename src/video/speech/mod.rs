//! Voice-over synthesis and speech recognition seams.

pub mod elevenlabs;
pub mod google;
pub mod whisper;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::json;

use crate::ui::prelude::*;
use crate::video::config::EngineConfig;
use crate::video::model::VoiceEngine;
use crate::video::retry::{RetryPolicy, ServiceError};
use crate::video::subtitles::RecognizedSegment;

pub use elevenlabs::ElevenLabsSynthesizer;
pub use google::GoogleTtsSynthesizer;
pub use whisper::WhisperRecognizer;

const WORDS_PER_MINUTE: f64 = 150.0;

/// Encoded audio plus a text-based duration estimate.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub estimated_duration: f64,
}

pub trait SpeechSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, ServiceError>;
}

pub trait SpeechRecognizer {
    /// Timed segments in ascending start order.
    fn transcribe(&self, audio: &Path, language: &str) -> Result<Vec<RecognizedSegment>>;
}

/// A synthesizer and the engine it speaks for.
pub struct Narrator {
    pub engine: VoiceEngine,
    pub synthesizer: Box<dyn SpeechSynthesizer>,
    /// Voice used when the request names none.
    pub default_voice: String,
}

impl Narrator {
    fn from_config(config: &EngineConfig, engine: VoiceEngine) -> Result<Self, ServiceError> {
        let synthesizer: Box<dyn SpeechSynthesizer> = match engine {
            VoiceEngine::Google => Box::new(GoogleTtsSynthesizer::from_config(config)?),
            VoiceEngine::ElevenLabs => Box::new(ElevenLabsSynthesizer::from_config(config)?),
        };
        Ok(Self {
            engine,
            synthesizer,
            default_voice: config.default_voice(engine),
        })
    }
}

/// Audio plus the engine and voice that actually produced it.
#[derive(Debug, Clone)]
pub struct Narration {
    pub audio: SynthesizedAudio,
    pub engine: VoiceEngine,
    pub voice: String,
}

/// Primary narrator with an optional fallback, tried once the primary has
/// used up its retries.
pub struct VoiceChain {
    primary: Narrator,
    fallback: Option<Narrator>,
}

impl VoiceChain {
    pub fn new(primary: Narrator) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Narrator) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn engine(&self) -> VoiceEngine {
        self.primary.engine
    }

    /// Google alone, or ElevenLabs backed by Google when Google is configured.
    pub fn from_config(config: &EngineConfig, engine: VoiceEngine) -> Result<Self> {
        match engine {
            VoiceEngine::Google => {
                let google = Narrator::from_config(config, VoiceEngine::Google)
                    .context("Voice synthesis is not available")?;
                Ok(Self::new(google))
            }
            VoiceEngine::ElevenLabs => {
                let google = Narrator::from_config(config, VoiceEngine::Google);
                match (Narrator::from_config(config, VoiceEngine::ElevenLabs), google) {
                    (Ok(elevenlabs), Ok(google)) => Ok(Self::new(elevenlabs).with_fallback(google)),
                    (Ok(elevenlabs), Err(_)) => Ok(Self::new(elevenlabs)),
                    (Err(err), Ok(google)) => {
                        emit(
                            Level::Warn,
                            "speech.engine.unavailable",
                            &format!("ElevenLabs is unavailable ({err}); using Google TTS"),
                            None,
                        );
                        Ok(Self::new(google))
                    }
                    (Err(err), Err(_)) => {
                        Err(anyhow!(err)).context("Voice synthesis is not available")
                    }
                }
            }
        }
    }

    /// Synthesize `text`. `voice` applies to the primary engine; the fallback
    /// speaks with its own default voice.
    pub fn speak(&self, text: &str, voice: Option<&str>, retry: &RetryPolicy) -> Result<Narration> {
        let primary_voice = voice
            .map(str::to_string)
            .unwrap_or_else(|| self.primary.default_voice.clone());

        let err = match narrate(&self.primary, text, &primary_voice, retry) {
            Ok(narration) => return Ok(narration),
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            return Err(anyhow!(err))
                .with_context(|| format!("{} speech synthesis failed", self.primary.engine));
        };

        emit(
            Level::Warn,
            "speech.fallback",
            &format!(
                "{} synthesis failed ({err}); falling back to {}",
                self.primary.engine, fallback.engine
            ),
            Some(json!({
                "from": self.primary.engine.to_string(),
                "to": fallback.engine.to_string(),
                "error": err.to_string(),
            })),
        );

        narrate(fallback, text, &fallback.default_voice, retry).map_err(|fallback_err| {
            anyhow!(fallback_err).context(format!(
                "{} failed ({err}) and {} fallback failed",
                self.primary.engine, fallback.engine
            ))
        })
    }
}

fn narrate(
    narrator: &Narrator,
    text: &str,
    voice: &str,
    retry: &RetryPolicy,
) -> Result<Narration, ServiceError> {
    let label = format!("{} speech synthesis", narrator.engine);
    let audio = retry.run(&label, || narrator.synthesizer.synthesize(text, voice))?;
    Ok(Narration {
        audio,
        engine: narrator.engine,
        voice: voice.to_string(),
    })
}

/// Spoken duration at 150 words per minute, scaled by `speaking_rate`.
pub fn estimate_duration(text: &str, speaking_rate: f64) -> f64 {
    let rate = if speaking_rate.is_finite() && speaking_rate > 0.0 {
        speaking_rate
    } else {
        1.0
    };
    let words = text.split_whitespace().count() as f64;
    words / WORDS_PER_MINUTE * 60.0 / rate
}
