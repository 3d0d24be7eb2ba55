//! Single-item production: script, voice-over, captions, background, render.

pub mod batch;
pub mod report;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use crate::ui::prelude::*;
use crate::video::background::{Background, BackgroundResolver};
use crate::video::config::{EngineConfig, OutputDirectories};
use crate::video::model::{AudioTrack, ContentFormat, RenderedVideo, Script, VoiceEngine};
use crate::video::render::{Compositor, RenderJob, TAIL_SECONDS};
use crate::video::retry::RetryPolicy;
use crate::video::script::ScriptSource;
use crate::video::script::file::save_script;
use crate::video::speech::{SpeechRecognizer, VoiceChain, WhisperRecognizer};
use crate::video::subtitles::{build_cues, split_sentences, write_ass, write_srt};
use crate::video::support::ffmpeg::probe_duration_seconds;

pub use batch::{BatchFailure, BatchReport, BatchState, run_batch};

/// What to produce for one item.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub format: ContentFormat,
    pub theme: Option<String>,
    /// Voice of the primary engine; its configured default when absent.
    pub voice: Option<String>,
    /// Still image used instead of the background chain.
    pub background_image: Option<PathBuf>,
}

impl ProduceRequest {
    pub fn new(format: ContentFormat) -> Self {
        Self {
            format,
            theme: None,
            voice: None,
            background_image: None,
        }
    }
}

type DurationProbe = fn(&Path) -> Result<f64>;

pub struct Producer {
    config: EngineConfig,
    dirs: OutputDirectories,
    scripts: Box<dyn ScriptSource>,
    voices: VoiceChain,
    recognizer: Box<dyn SpeechRecognizer>,
    resolver: BackgroundResolver,
    compositor: Compositor,
    retry: RetryPolicy,
    probe: DurationProbe,
}

impl Producer {
    pub fn new(
        config: EngineConfig,
        scripts: Box<dyn ScriptSource>,
        voices: VoiceChain,
        recognizer: Box<dyn SpeechRecognizer>,
        resolver: BackgroundResolver,
        compositor: Compositor,
    ) -> Self {
        Self {
            dirs: config.directories(),
            retry: RetryPolicy::from_config(&config),
            config,
            scripts,
            voices,
            recognizer,
            resolver,
            compositor,
            probe: probe_duration_seconds,
        }
    }

    /// Wire the production collaborators from configuration. The recognizer
    /// is loaded once here and shared by every item.
    pub fn from_config(
        config: EngineConfig,
        scripts: Box<dyn ScriptSource>,
        engine: VoiceEngine,
    ) -> Result<Self> {
        let voices = VoiceChain::from_config(&config, engine)?;
        let recognizer = WhisperRecognizer::load(&config)?;
        let resolver = BackgroundResolver::from_config(&config);
        let compositor = Compositor::from_config(&config);

        Ok(Self::new(
            config,
            scripts,
            voices,
            Box::new(recognizer),
            resolver,
            compositor,
        ))
    }

    #[cfg(test)]
    pub fn with_duration_probe(mut self, probe: DurationProbe) -> Self {
        self.probe = probe;
        self
    }

    #[cfg(test)]
    pub fn directories(&self) -> &OutputDirectories {
        &self.dirs
    }

    /// Run the full chain for one item and record what it used in `state`.
    pub fn produce(
        &self,
        request: &ProduceRequest,
        state: &mut BatchState,
    ) -> Result<RenderedVideo> {
        let (script, script_path) = draft_script(
            self.scripts.as_ref(),
            &self.dirs,
            request,
            &state.recent_hooks,
        )?;
        emit(
            Level::Info,
            "pipeline.script.saved",
            &format!("Script \"{}\" saved to {}", script.title, script_path.display()),
            Some(json!({ "id": script.id, "words": script.word_count() })),
        );

        let audio = self.voice_over(&script, request.voice.as_deref())?;

        let segments = self
            .recognizer
            .transcribe(&audio.path, &self.config.language)
            .with_context(|| format!("Failed to transcribe {}", audio.path.display()))?;
        emit(
            Level::Debug,
            "pipeline.transcribed",
            &format!("{} recognized segments", segments.len()),
            None,
        );

        let cues = build_cues(&script.full_text, &segments, &self.config.alignment_params())?;
        let srt_path = self.dirs.srt_path(&script.id);
        let ass_path = self.dirs.ass_path(&script.id);
        write_srt(&cues, &srt_path)?;
        write_ass(&cues, self.config.frame_size(), &ass_path)?;

        let duration = audio.duration + TAIL_SECONDS;
        let background = match &request.background_image {
            Some(image) => Background::Image(image.clone()),
            None => self
                .resolver
                .resolve(script.format, duration, &state.used_backgrounds),
        };
        emit(
            Level::Info,
            "pipeline.background",
            &format!("Background: {}", background.describe()),
            None,
        );

        let video_path =
            self.dirs
                .video_path(&self.config.output_prefix, script.format, &script.id);
        let prepared = self.dirs.prepared_background_path(&script.id);
        let composition = self.compositor.compose(&RenderJob {
            background: &background,
            audio: &audio.path,
            ass: &ass_path,
            srt: &srt_path,
            duration,
            prepared: &prepared,
            output: &video_path,
        });
        remove_scratch(&prepared);
        let composition = composition?;

        let video = RenderedVideo {
            script,
            audio,
            srt_path,
            video_path,
            background: background.key(),
            used_fallback_render: composition.used_fallback,
        };
        state.record(&video);

        emit(
            Level::Success,
            "pipeline.item.done",
            &format!("Video ready: {}", video.video_path.display()),
            Some(json!({
                "id": video.script.id,
                "format": video.script.format,
                "video": video.video_path.display().to_string(),
                "background": video.background,
                "fallback_render": video.used_fallback_render,
            })),
        );
        Ok(video)
    }

    fn voice_over(&self, script: &Script, voice: Option<&str>) -> Result<AudioTrack> {
        let narration = self.voices.speak(&script.full_text, voice, &self.retry)?;
        let synthesized = narration.audio;

        let path = self.dirs.audio_path(script.format, &script.id);
        fs::write(&path, &synthesized.bytes)
            .with_context(|| format!("Failed to write audio to {}", path.display()))?;

        let duration = match (self.probe)(&path) {
            Ok(duration) => duration,
            Err(err) => {
                emit(
                    Level::Debug,
                    "pipeline.audio.estimated",
                    &format!("Using estimated duration for {}: {err:#}", path.display()),
                    None,
                );
                synthesized.estimated_duration
            }
        };

        emit(
            Level::Info,
            "pipeline.audio.saved",
            &format!(
                "Voice-over {} ({duration:.1}s, {} {})",
                path.display(),
                narration.engine,
                narration.voice
            ),
            None,
        );
        Ok(AudioTrack {
            path,
            duration,
            voice: narration.voice,
            engine: narration.engine,
        })
    }
}

/// Generate, validate and persist a script without rendering anything.
pub fn draft_script(
    source: &dyn ScriptSource,
    dirs: &OutputDirectories,
    request: &ProduceRequest,
    recent_hooks: &[String],
) -> Result<(Script, PathBuf)> {
    dirs.ensure()?;
    let script = source.generate(request.format, request.theme.as_deref(), recent_hooks)?;
    split_sentences(&script.full_text)
        .with_context(|| format!("Script {} cannot be captioned", script.id))?;

    let path = dirs.script_path(script.format, &script.id);
    save_script(&script, &path)?;
    Ok((script, path))
}

fn remove_scratch(path: &Path) {
    if path.exists()
        && let Err(err) = fs::remove_file(path)
    {
        emit(
            Level::Warn,
            "pipeline.cleanup_failed",
            &format!("Failed to remove temporary file {}: {err}", path.display()),
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use tempfile::TempDir;

    use crate::video::render::{FfmpegRunOptions, FfmpegRunner};
    use crate::video::retry::ServiceError;
    use crate::video::speech::{Narrator, SpeechSynthesizer, SynthesizedAudio};
    use crate::video::subtitles::RecognizedSegment;

    struct FixedScript(Script);

    impl ScriptSource for FixedScript {
        fn generate(
            &self,
            _format: ContentFormat,
            _theme: Option<&str>,
            _recent_hooks: &[String],
        ) -> Result<Script> {
            Ok(self.0.clone())
        }
    }

    struct FlakySynth {
        failures_left: RefCell<u32>,
    }

    impl SpeechSynthesizer for FlakySynth {
        fn synthesize(&self, text: &str, _voice: &str) -> Result<SynthesizedAudio, ServiceError> {
            let mut left = self.failures_left.borrow_mut();
            if *left > 0 {
                *left -= 1;
                return Err(ServiceError::Unavailable {
                    service: "fake",
                    detail: "busy".to_string(),
                });
            }
            Ok(SynthesizedAudio {
                bytes: b"ID3fake".to_vec(),
                estimated_duration: text.split_whitespace().count() as f64 * 0.4,
            })
        }
    }

    struct RefusingSynth;

    impl SpeechSynthesizer for RefusingSynth {
        fn synthesize(&self, _text: &str, _voice: &str) -> Result<SynthesizedAudio, ServiceError> {
            Err(ServiceError::Rejected {
                service: "fake",
                status: 402,
                detail: "quota".to_string(),
            })
        }
    }

    fn flaky_narrator(engine: VoiceEngine, voice: &str) -> Narrator {
        Narrator {
            engine,
            synthesizer: Box::new(FlakySynth {
                failures_left: RefCell::new(1),
            }),
            default_voice: voice.to_string(),
        }
    }

    struct ScriptedRecognizer(Vec<RecognizedSegment>);

    impl SpeechRecognizer for ScriptedRecognizer {
        fn transcribe(&self, _audio: &Path, _language: &str) -> Result<Vec<RecognizedSegment>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Clone, Default)]
    struct TouchingRunner {
        calls: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl FfmpegRunner for TouchingRunner {
        fn run(&self, args: &[String], _options: FfmpegRunOptions) -> Result<()> {
            self.calls.borrow_mut().push(args.to_vec());
            if let Some(output) = args.last() {
                fs::write(output, b"video")?;
            }
            Ok(())
        }
    }

    fn script(full_text: &str) -> Script {
        Script {
            id: "item0001".to_string(),
            format: ContentFormat::Tuto,
            title: "Tuto".to_string(),
            hook: "Flashé ?".to_string(),
            body: "Conteste.".to_string(),
            cta: "Lien en bio.".to_string(),
            full_text: full_text.to_string(),
            duration_estimate: 10,
            hashtags: vec![],
            created_at: chrono::Local::now(),
        }
    }

    fn producer(dir: &TempDir, script: Script, runner: TouchingRunner) -> Producer {
        let voices = VoiceChain::new(flaky_narrator(VoiceEngine::ElevenLabs, "voice-a"));
        producer_with_voices(dir, script, runner, voices)
    }

    fn producer_with_voices(
        dir: &TempDir,
        script: Script,
        runner: TouchingRunner,
        voices: VoiceChain,
    ) -> Producer {
        let config = EngineConfig {
            output_dir: dir.path().join("out"),
            assets_dir: dir.path().join("assets"),
            cache_dir: dir.path().join("cache"),
            retry_backoff_seconds: 0.0,
            ..EngineConfig::default()
        };
        let resolver = BackgroundResolver::new(
            &config.assets_dir,
            None,
            None,
            config.cache_dir.join("work"),
            config.frame_size(),
        );
        let compositor = Compositor::new(
            Box::new(runner),
            config.frame_size(),
            std::time::Duration::from_secs(5),
            None,
        );
        Producer::new(
            config,
            Box::new(FixedScript(script)),
            voices,
            Box::new(ScriptedRecognizer(vec![
                RecognizedSegment::new(0.0, 1.2, "flashé"),
                RecognizedSegment::new(1.3, 2.4, "conteste"),
                RecognizedSegment::new(2.5, 4.0, "lien en bio"),
            ])),
            resolver,
            compositor,
        )
        .with_duration_probe(|_| anyhow::bail!("no ffprobe in tests"))
    }

    #[test]
    fn produces_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TouchingRunner::default();
        let producer = producer(
            &dir,
            script("Flashé ? Conteste. Lien en bio."),
            runner.clone(),
        );
        let mut state = BatchState::default();

        let video = producer
            .produce(&ProduceRequest::new(ContentFormat::Tuto), &mut state)
            .unwrap();

        let dirs = producer.directories();
        assert!(dirs.script_path(ContentFormat::Tuto, "item0001").exists());
        assert_eq!(video.audio.path, dirs.audio_path(ContentFormat::Tuto, "item0001"));
        assert_eq!(video.audio.voice, "voice-a");
        assert_eq!(video.audio.engine, VoiceEngine::ElevenLabs);
        assert_eq!(
            video.video_path,
            dirs.video_path("noradar", ContentFormat::Tuto, "item0001")
        );
        assert!(!video.used_fallback_render);
        assert!(video.background.starts_with("gradient:"));

        let srt = fs::read_to_string(&video.srt_path).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,200\nFlashé ?\n"));
        assert!(srt.contains("00:00:02,500 --> 00:00:04,000\nLien en bio.\n"));
        assert!(dirs.ass_path("item0001").exists());

        assert_eq!(state.recent_hooks, vec!["Flashé ?".to_string()]);
        assert!(state.used_backgrounds.contains(&video.background));
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn refused_voice_over_falls_back_to_google() {
        let dir = tempfile::tempdir().unwrap();
        let voices = VoiceChain::new(Narrator {
            engine: VoiceEngine::ElevenLabs,
            synthesizer: Box::new(RefusingSynth),
            default_voice: "voice-a".to_string(),
        })
        .with_fallback(flaky_narrator(VoiceEngine::Google, "fr-FR-Neural2-B"));
        let producer = producer_with_voices(
            &dir,
            script("Flashé ? Conteste. Lien en bio."),
            TouchingRunner::default(),
            voices,
        );
        let mut state = BatchState::default();

        let video = producer
            .produce(&ProduceRequest::new(ContentFormat::Tuto), &mut state)
            .unwrap();

        assert_eq!(video.audio.engine, VoiceEngine::Google);
        assert_eq!(video.audio.voice, "fr-FR-Neural2-B");
        assert_eq!(fs::read(&video.audio.path).unwrap(), b"ID3fake");
    }

    #[test]
    fn image_override_skips_the_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let producer = producer(&dir, script("Une phrase."), TouchingRunner::default());
        let mut state = BatchState::default();
        let request = ProduceRequest {
            background_image: Some(dir.path().join("cover.png")),
            ..ProduceRequest::new(ContentFormat::Tuto)
        };

        let video = producer.produce(&request, &mut state).unwrap();

        assert_eq!(video.background, "cover.png");
    }

    #[test]
    fn unsplittable_script_fails_before_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let producer = producer(&dir, script("   "), TouchingRunner::default());
        let mut state = BatchState::default();

        let err = producer
            .produce(&ProduceRequest::new(ContentFormat::Tuto), &mut state)
            .unwrap_err();

        assert!(format!("{err:#}").contains("cannot be captioned"));
        let audio_files = fs::read_dir(&producer.directories().audio).unwrap().count();
        assert_eq!(audio_files, 0);
        assert!(state.recent_hooks.is_empty());
    }
}
