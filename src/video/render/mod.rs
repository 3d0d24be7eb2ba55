//! Final video composition
//!
//! A render is two ffmpeg passes: the background is first conformed to the
//! frame size and audio duration, then captions and the optional watermark are
//! burned in while muxing the voice-over. When the styled pass fails the
//! render is retried once with the plain SRT track.

pub mod ffmpeg;
pub mod filters;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use crate::ui::prelude::*;
use crate::video::background::Background;
use crate::video::config::EngineConfig;

pub use ffmpeg::{FfmpegRunOptions, FfmpegRunner, SystemFfmpegRunner};
pub use filters::Watermark;

/// Silence kept after the voice-over ends.
pub const TAIL_SECONDS: f64 = 0.5;

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("could not prepare background: {0:#}")]
    Background(anyhow::Error),
    #[error("render failed ({primary:#}); fallback render failed too ({fallback:#})")]
    Render {
        primary: anyhow::Error,
        fallback: anyhow::Error,
    },
}

/// Everything one render reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub background: &'a Background,
    pub audio: &'a Path,
    pub ass: &'a Path,
    pub srt: &'a Path,
    /// Length of the final video in seconds
    pub duration: f64,
    pub prepared: &'a Path,
    pub output: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composition {
    pub used_fallback: bool,
}

pub struct Compositor {
    runner: Box<dyn FfmpegRunner>,
    frame: (u32, u32),
    timeout: Duration,
    watermark: Option<Watermark>,
}

impl Compositor {
    pub fn new(
        runner: Box<dyn FfmpegRunner>,
        frame: (u32, u32),
        timeout: Duration,
        watermark: Option<Watermark>,
    ) -> Self {
        Self {
            runner,
            frame,
            timeout,
            watermark,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let watermark = config.watermark().map(|text| Watermark {
            text: text.to_string(),
            position: config.watermark_position,
            font_size: config.watermark_font_size,
        });
        Self::new(
            Box::new(SystemFfmpegRunner),
            config.frame_size(),
            EngineConfig::timeout(config.encode_timeout_secs),
            watermark,
        )
    }

    pub fn compose(&self, job: &RenderJob<'_>) -> Result<Composition, CompositionError> {
        self.prepare_background(job)
            .map_err(CompositionError::Background)?;

        let primary = match self.run(primary_args(job, self.watermark.as_ref()), "Rendering video") {
            Ok(()) => return Ok(Composition { used_fallback: false }),
            Err(err) => err,
        };

        emit(
            Level::Warn,
            "render.fallback",
            &format!("Styled render failed, retrying with plain subtitles: {primary:#}"),
            Some(serde_json::json!({ "output": job.output.display().to_string() })),
        );

        match self.run(fallback_args(job), "Rendering video (plain subtitles)") {
            Ok(()) => Ok(Composition { used_fallback: true }),
            Err(fallback) => Err(CompositionError::Render { primary, fallback }),
        }
    }

    fn prepare_background(&self, job: &RenderJob<'_>) -> Result<()> {
        let source = match job.background {
            Background::Clip { path, .. } => vec![
                "-stream_loop".to_string(),
                "-1".to_string(),
                "-i".to_string(),
                path_arg(path),
            ],
            Background::Image(path) => vec![
                "-loop".to_string(),
                "1".to_string(),
                "-i".to_string(),
                path_arg(path),
            ],
            Background::Gradient(spec) => {
                let gradient = lavfi_input(&spec.lavfi_source());
                match self.run(prepare_args(gradient, job, self.frame), "Generating background") {
                    Ok(()) => return Ok(()),
                    Err(err) => {
                        emit(
                            Level::Debug,
                            "render.gradient.solid",
                            &format!("Gradient source failed, using a solid colour: {err:#}"),
                            None,
                        );
                        lavfi_input(&spec.solid_source())
                    }
                }
            }
        };

        self.run(prepare_args(source, job, self.frame), "Preparing background")
    }

    fn run(&self, args: Vec<String>, label: &str) -> Result<()> {
        self.runner
            .run(&args, FfmpegRunOptions::new(self.timeout, label))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn lavfi_input(source: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        source.to_string(),
    ]
}

fn prepare_args(input: Vec<String>, job: &RenderJob<'_>, frame: (u32, u32)) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    args.extend(input);
    args.extend(
        [
            "-t",
            &format!("{:.3}", job.duration),
            "-vf",
            &filters::cover_frame(frame),
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-crf",
            "23",
            "-pix_fmt",
            "yuv420p",
            "-an",
        ]
        .map(String::from),
    );
    args.push(path_arg(job.prepared));
    args
}

fn encode_tail(output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-crf",
        "20",
        "-c:a",
        "aac",
        "-b:a",
        "192k",
        "-shortest",
        "-movflags",
        "+faststart",
    ]
    .map(String::from)
    .to_vec();
    args.push(path_arg(output));
    args
}

fn primary_args(job: &RenderJob<'_>, watermark: Option<&Watermark>) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(job.prepared),
        "-i".to_string(),
        path_arg(job.audio),
        "-filter_complex".to_string(),
        filters::primary_filter_graph(job.ass, watermark),
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
    ];
    args.extend(encode_tail(job.output));
    args
}

fn fallback_args(job: &RenderJob<'_>) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(job.prepared),
        "-i".to_string(),
        path_arg(job.audio),
        "-vf".to_string(),
        filters::fallback_filter(job.srt),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
    ];
    args.extend(encode_tail(job.output));
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::background::{ClipOrigin, GradientSpec};
    use crate::video::model::ContentFormat;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<Vec<String>>>>;

    /// Records every invocation and fails those matching `fail_if`.
    struct RecordingRunner {
        calls: Calls,
        fail_if: fn(&[String]) -> bool,
    }

    impl FfmpegRunner for RecordingRunner {
        fn run(&self, args: &[String], _options: FfmpegRunOptions) -> Result<()> {
            self.calls.borrow_mut().push(args.to_vec());
            if (self.fail_if)(args) {
                bail!("ffmpeg exited with status Some(1): simulated");
            }
            Ok(())
        }
    }

    fn compositor(fail_if: fn(&[String]) -> bool, watermark: Option<Watermark>) -> (Compositor, Calls) {
        let calls = Calls::default();
        let runner = RecordingRunner {
            calls: Rc::clone(&calls),
            fail_if,
        };
        (
            Compositor::new(Box::new(runner), (1080, 1920), Duration::from_secs(5), watermark),
            calls,
        )
    }

    fn has(args: &[String], needle: &str) -> bool {
        args.iter().any(|arg| arg.contains(needle))
    }

    fn clip() -> Background {
        Background::Clip {
            path: PathBuf::from("/bg/road.mp4"),
            origin: ClipOrigin::Local,
        }
    }

    fn job(background: &Background) -> RenderJob<'_> {
        RenderJob {
            background,
            audio: Path::new("/out/audio/tuto_ab12.mp3"),
            ass: Path::new("/work/ab12.ass"),
            srt: Path::new("/out/subtitles/ab12.srt"),
            duration: 21.5,
            prepared: Path::new("/work/ab12_bg.mp4"),
            output: Path::new("/out/videos/noradar_tuto_ab12.mp4"),
        }
    }

    #[test]
    fn successful_render_runs_prepare_then_primary() {
        let (compositor, calls) = compositor(|_| false, None);
        let background = clip();

        let result = compositor.compose(&job(&background)).unwrap();

        assert!(!result.used_fallback);
        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][..5], ["-y", "-stream_loop", "-1", "-i", "/bg/road.mp4"]);
        assert!(has(&calls[0], "-t") && calls[0].contains(&"21.500".to_string()));
        assert!(has(&calls[0], "force_original_aspect_ratio=increase,crop=1080:1920"));
        assert!(calls[1].contains(&"[0:v]ass='/work/ab12.ass'[v]".to_string()));
        assert_eq!(calls[1].last().unwrap(), "/out/videos/noradar_tuto_ab12.mp4");
    }

    #[test]
    fn failed_primary_falls_back_to_plain_subtitles() {
        let (compositor, calls) = compositor(|args| has(args, "-filter_complex"), None);
        let background = clip();

        let result = compositor.compose(&job(&background)).unwrap();

        assert!(result.used_fallback);
        let calls = calls.borrow();
        assert_eq!(calls.len(), 3);
        assert!(has(&calls[2], "subtitles='/out/subtitles/ab12.srt':force_style="));
        assert!(!has(&calls[2], "ass="));
    }

    #[test]
    fn failed_fallback_fails_the_item() {
        let (compositor, calls) = compositor(|args| !has(args, "-stream_loop"), None);
        let background = clip();

        let err = compositor.compose(&job(&background)).unwrap_err();

        assert!(matches!(err, CompositionError::Render { .. }));
        assert_eq!(calls.borrow().len(), 3);
    }

    #[test]
    fn watermark_is_part_of_primary_graph() {
        let watermark = Watermark {
            text: "@noradar".to_string(),
            position: crate::video::config::WatermarkPosition::BottomRight,
            font_size: 36,
        };
        let (compositor, calls) = compositor(|_| false, Some(watermark));
        let background = clip();

        compositor.compose(&job(&background)).unwrap();

        assert!(has(&calls.borrow()[1], ",drawtext=text='@noradar'"));
    }

    #[test]
    fn image_background_is_looped() {
        let (compositor, calls) = compositor(|_| false, None);
        let background = Background::Image(PathBuf::from("/img/poster.png"));

        compositor.compose(&job(&background)).unwrap();

        assert_eq!(calls.borrow()[0][..5], ["-y", "-loop", "1", "-i", "/img/poster.png"]);
    }

    #[test]
    fn gradient_falls_back_to_solid_colour() {
        let (compositor, calls) = compositor(|args| has(args, "gradients="), None);
        let background = Background::Gradient(GradientSpec::for_format(
            ContentFormat::Tuto,
            21.5,
            (1080, 1920),
        ));

        let result = compositor.compose(&job(&background)).unwrap();

        assert!(!result.used_fallback);
        let calls = calls.borrow();
        assert_eq!(calls.len(), 3);
        assert!(has(&calls[1], "color=c=0x4ECDC4"));
    }

    #[test]
    fn background_failure_is_reported() {
        let (compositor, _) = compositor(|args| has(args, "-stream_loop"), None);
        let background = clip();

        let err = compositor.compose(&job(&background)).unwrap_err();

        assert!(matches!(err, CompositionError::Background(_)));
    }
}
