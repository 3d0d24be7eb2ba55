use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use super::background::BackgroundResolver;
use super::cli::{AlignArgs, BackgroundArgs, BatchArgs, EngineCommands, ProduceArgs};
use super::config::EngineConfig;
use super::model::ContentFormat;
use super::pipeline::batch::plan_formats;
use super::pipeline::report::{key_value_table, print_batch_report};
use super::pipeline::{BatchState, ProduceRequest, Producer, draft_script, run_batch};
use super::script::file::load_script;
use super::script::{FileScriptSource, GeminiScriptSource, ScriptSource};
use super::speech::whisper::parse_whisper_json;
use super::subtitles::{RecognizedSegment, build_cues, parse_srt, write_ass, write_srt};
use crate::common::config::DocumentedConfig;
use crate::ui::prelude::*;

pub fn handle_engine_command(command: EngineCommands, config_path: Option<&Path>) -> Result<()> {
    match command {
        EngineCommands::Init => handle_init(config_path),
        EngineCommands::Produce(args) => handle_produce(args, load_config(config_path)?),
        EngineCommands::Batch(args) => handle_batch(args, load_config(config_path)?),
        EngineCommands::Align(args) => handle_align(args, load_config(config_path)?),
        EngineCommands::Background(args) => handle_background(args, load_config(config_path)?),
        EngineCommands::Status => handle_status(load_config(config_path)?),
        EngineCommands::Formats => handle_formats(),
    }
}

fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => <EngineConfig as DocumentedConfig>::config_path(),
    }
}

fn load_config(config_path: Option<&Path>) -> Result<EngineConfig> {
    EngineConfig::load_from(&resolve_config_path(config_path)?)
}

fn handle_init(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_config_path(config_path)?;
    let config = EngineConfig::load_from(&path)?;
    config.directories().ensure()?;

    let set = |value: &Option<String>| {
        if value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
            "set".to_string()
        } else {
            "missing".to_string()
        }
    };
    let found = |program: &str| match which::which(program) {
        Ok(path) => path.display().to_string(),
        Err(_) => "not found".to_string(),
    };

    let rows = vec![
        ("Gemini API key".to_string(), set(&config.gemini_api_key)),
        ("Voice engine".to_string(), config.voice_engine.to_string()),
        ("Google TTS API key".to_string(), set(&config.google_tts_api_key)),
        ("ElevenLabs API key".to_string(), set(&config.elevenlabs_api_key)),
        ("ElevenLabs voice".to_string(), set(&config.elevenlabs_voice_id)),
        ("Pexels API key".to_string(), set(&config.pexels_api_key)),
        ("ffmpeg".to_string(), found("ffmpeg")),
        ("ffprobe".to_string(), found("ffprobe")),
        ("uvx (WhisperX)".to_string(), found("uvx")),
    ];

    emit(
        Level::Success,
        "engine.init.config",
        &format!("Config file: {}", path.display()),
        Some(json!({
            "config": path.display().to_string(),
            "checks": rows.iter().map(|(k, v)| json!({ "name": k, "value": v })).collect::<Vec<_>>(),
        })),
    );
    if matches!(get_output_format(), OutputFormat::Text) {
        println!("{}", key_value_table(("Requirement", "Status"), &rows));
    }
    Ok(())
}

fn script_source(config: &EngineConfig, script_file: Option<&Path>) -> Result<Box<dyn ScriptSource>> {
    Ok(match script_file {
        Some(path) => Box::new(FileScriptSource::new(path)),
        None => Box::new(
            GeminiScriptSource::from_config(config).context("Script generation is not available")?,
        ),
    })
}

fn handle_produce(args: ProduceArgs, config: EngineConfig) -> Result<()> {
    let source = script_source(&config, args.script_file.as_deref())?;
    let request = ProduceRequest {
        format: args.format,
        theme: args.theme,
        voice: args.voice,
        background_image: args.background,
    };

    if args.script_only {
        let (script, path) = draft_script(source.as_ref(), &config.directories(), &request, &[])?;
        emit(
            Level::Success,
            "engine.produce.script",
            &format!("Script \"{}\" saved to {}", script.title, path.display()),
            Some(json!({ "id": script.id, "path": path.display().to_string() })),
        );
        if matches!(get_output_format(), OutputFormat::Text) {
            println!("{}", script.full_text);
        }
        return Ok(());
    }

    let engine = args.voice_engine.unwrap_or(config.voice_engine);
    let producer = Producer::from_config(config, source, engine)?;
    let mut state = BatchState::default();
    producer.produce(&request, &mut state)?;
    Ok(())
}

fn handle_batch(args: BatchArgs, config: EngineConfig) -> Result<()> {
    let formats = if args.formats.is_empty() {
        ContentFormat::ALL.to_vec()
    } else {
        args.formats
    };
    let plan = plan_formats(&formats, args.count);

    let engine = config.voice_engine;
    let voices = config.voice_pool(engine);
    let source = script_source(&config, None)?;
    let producer = Producer::from_config(config, source, engine)?;
    let mut state = BatchState::default();
    let mut rng = rand::thread_rng();

    let report = run_batch(&plan, |number, format| {
        let request = ProduceRequest {
            format,
            theme: args.theme.clone(),
            voice: state.next_voice(&voices, &mut rng),
            background_image: None,
        };
        producer
            .produce(&request, &mut state)
            .map(|video| (number, video))
    })?;

    print_batch_report(&report);
    Ok(())
}

fn read_script_text(path: &Path) -> Result<String> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return Ok(load_script(path)?.full_text);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))
}

/// Segments from WhisperX output, a bare JSON array, or an existing SRT.
fn read_segments(path: &Path) -> Result<Vec<RecognizedSegment>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read segments {}", path.display()))?;
    let is_srt = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));
    if is_srt {
        let cues = parse_srt(&contents)
            .with_context(|| format!("Failed to parse subtitles in {}", path.display()))?;
        return Ok(cues
            .into_iter()
            .map(|cue| RecognizedSegment::new(cue.start, cue.end, cue.text))
            .collect());
    }
    if contents.trim_start().starts_with('[') {
        let mut segments: Vec<RecognizedSegment> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse segments in {}", path.display()))?;
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        return Ok(segments);
    }
    parse_whisper_json(&contents)
}

fn handle_align(args: AlignArgs, config: EngineConfig) -> Result<()> {
    let text = read_script_text(&args.script)?;
    let segments = match &args.segments {
        Some(path) => read_segments(path)?,
        None => Vec::new(),
    };

    let cues = build_cues(&text, &segments, &config.alignment_params())
        .with_context(|| format!("Cannot caption {}", args.script.display()))?;

    let srt_path = args
        .out_srt
        .unwrap_or_else(|| args.script.with_extension("srt"));
    write_srt(&cues, &srt_path)?;
    if let Some(ass_path) = &args.out_ass {
        write_ass(&cues, config.frame_size(), ass_path)?;
    }

    emit(
        Level::Success,
        "engine.align.done",
        &format!(
            "{} cues from {} segments written to {}",
            cues.len(),
            segments.len(),
            srt_path.display()
        ),
        Some(json!({
            "srt": srt_path.display().to_string(),
            "ass": args.out_ass.as_ref().map(|p| p.display().to_string()),
            "cues": cues.len(),
            "segments": segments.len(),
        })),
    );
    Ok(())
}

fn handle_background(args: BackgroundArgs, config: EngineConfig) -> Result<()> {
    config.directories().ensure()?;
    let resolver = BackgroundResolver::from_config(&config);
    let background = resolver.resolve(args.format, args.duration, &HashSet::new());

    emit(
        Level::Success,
        "engine.background.resolved",
        &format!("{}: {}", args.format, background.describe()),
        Some(json!({
            "format": args.format,
            "key": background.key(),
            "stock_search": resolver.has_stock_search(),
        })),
    );
    Ok(())
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_file())
                .count()
        })
        .unwrap_or(0)
}

fn handle_status(config: EngineConfig) -> Result<()> {
    let dirs = config.directories();
    let mut counts: Vec<(&str, usize)> = [
        ("scripts", &dirs.scripts),
        ("audio", &dirs.audio),
        ("subtitles", &dirs.subtitles),
        ("videos", &dirs.videos),
        ("backgrounds", &dirs.assets),
    ]
    .into_iter()
    .map(|(name, dir)| (name, count_files(dir)))
    .collect();
    let cached = ContentFormat::ALL
        .iter()
        .map(|format| count_files(&dirs.stock_cache_for(*format)))
        .sum();
    counts.push(("stock cache", cached));

    let data: serde_json::Map<String, serde_json::Value> = counts
        .iter()
        .map(|(name, count)| (name.to_string(), json!(count)))
        .collect();
    emit(
        Level::Info,
        "engine.status",
        &format!("Output directory: {}", config.output_dir.display()),
        Some(json!({
            "output_dir": config.output_dir.display().to_string(),
            "counts": data,
        })),
    );

    if matches!(get_output_format(), OutputFormat::Text) {
        let rows: Vec<(String, String)> = counts
            .iter()
            .map(|(name, count)| (name.to_string(), count.to_string()))
            .collect();
        println!("{}", key_value_table(("Directory", "Files"), &rows));
    }
    Ok(())
}

fn handle_formats() -> Result<()> {
    match get_output_format() {
        OutputFormat::Json => {
            for format in ContentFormat::ALL {
                let (top, bottom) = format.gradient_colors();
                emit(
                    Level::Info,
                    "engine.format",
                    format.brief(),
                    Some(json!({
                        "format": format,
                        "max_words": format.max_words(),
                        "gradient": [top, bottom],
                    })),
                );
            }
        }
        OutputFormat::Text => {
            let rows: Vec<(String, String)> = ContentFormat::ALL
                .iter()
                .map(|format| {
                    (
                        format.to_string(),
                        format!("{} ({} words max)", format.brief(), format.max_words()),
                    )
                })
                .collect();
            println!("{}", key_value_table(("Format", "Direction"), &rows));
        }
    }
    Ok(())
}
