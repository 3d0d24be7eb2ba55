use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use serde_json::json;

use super::batch::{BatchReport, duplicate_hook_count};
use crate::ui::prelude::*;
use crate::video::model::RenderedVideo;

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).add_attribute(Attribute::Bold))
        .collect()
}

/// One row per batch item, in batch order.
pub fn batch_table(report: &BatchReport<(usize, RenderedVideo)>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["#", "Format", "Status", "Voice", "Background", "Output"]));

    let mut rows: Vec<(usize, Vec<Cell>)> = report
        .completed
        .iter()
        .map(|(number, video)| {
            let status = if video.used_fallback_render {
                Cell::new("done (plain subtitles)").fg(Color::Yellow)
            } else {
                Cell::new("done").fg(Color::Green)
            };
            (
                *number,
                vec![
                    Cell::new(number),
                    Cell::new(video.script.format),
                    status,
                    Cell::new(&video.audio.voice),
                    Cell::new(&video.background),
                    Cell::new(video.video_path.display()),
                ],
            )
        })
        .collect();

    rows.extend(report.failures.iter().map(|failure| {
        (
            failure.number,
            vec![
                Cell::new(failure.number),
                Cell::new(failure.format),
                Cell::new("failed").fg(Color::Red),
                Cell::new(""),
                Cell::new(""),
                Cell::new(&failure.error),
            ],
        )
    }));
    rows.sort_by_key(|(number, _)| *number);

    for (_, row) in rows {
        table.add_row(row);
    }
    table
}

/// Print the batch table (text mode) and the completed/failed tallies.
pub fn print_batch_report(report: &BatchReport<(usize, RenderedVideo)>) {
    let videos: Vec<RenderedVideo> = report
        .completed
        .iter()
        .map(|(_, video)| video.clone())
        .collect();
    let duplicates = duplicate_hook_count(&videos);

    if matches!(get_output_format(), OutputFormat::Text) {
        separator(false);
        println!("{}", batch_table(report));
    }

    let level = if report.failed_count() == 0 {
        Level::Success
    } else {
        Level::Warn
    };
    emit(
        level,
        "pipeline.batch.done",
        &format!(
            "Batch finished: {}/{} completed, {} failed",
            report.completed_count(),
            report.total,
            report.failed_count()
        ),
        Some(json!({
            "total": report.total,
            "completed": report.completed_count(),
            "failed": report.failed_count(),
            "videos": videos
                .iter()
                .map(|video| video.video_path.display().to_string())
                .collect::<Vec<_>>(),
        })),
    );

    if duplicates > 0 {
        emit(
            Level::Warn,
            "pipeline.batch.duplicate_hooks",
            &format!("{duplicates} duplicated hooks in this batch"),
            None,
        );
    } else if !videos.is_empty() {
        emit(
            Level::Info,
            "pipeline.batch.unique_hooks",
            &format!("{} unique scripts out of {}", videos.len(), videos.len()),
            None,
        );
    }
}

/// Two-column key/value table used by `init` and `status`.
pub fn key_value_table(title: (&str, &str), rows: &[(String, String)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&[title.0, title.1]));
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::video::model::{AudioTrack, ContentFormat, Script, VoiceEngine};
    use crate::video::pipeline::BatchFailure;

    fn video(id: &str) -> RenderedVideo {
        RenderedVideo {
            script: Script {
                id: id.to_string(),
                format: ContentFormat::Tuto,
                title: "T".to_string(),
                hook: "Hook".to_string(),
                body: String::new(),
                cta: String::new(),
                full_text: "Hook".to_string(),
                duration_estimate: 5,
                hashtags: vec![],
                created_at: chrono::Local::now(),
            },
            audio: AudioTrack {
                path: PathBuf::from("a.mp3"),
                duration: 5.0,
                voice: "voice-b".to_string(),
                engine: VoiceEngine::Google,
            },
            srt_path: PathBuf::from("a.srt"),
            video_path: PathBuf::from(format!("/out/noradar_tuto_{id}.mp4")),
            background: "road_01.mp4".to_string(),
            used_fallback_render: false,
        }
    }

    #[test]
    fn table_lists_items_in_batch_order() {
        let report = BatchReport {
            total: 3,
            completed: vec![(1, video("aaaa")), (3, video("cccc"))],
            failures: vec![BatchFailure {
                number: 2,
                format: ContentFormat::Mythe,
                error: "script contains no sentence to caption".to_string(),
            }],
        };

        let rendered = batch_table(&report).to_string();
        let first = rendered.find("noradar_tuto_aaaa").unwrap();
        let failed = rendered.find("failed").unwrap();
        let last = rendered.find("noradar_tuto_cccc").unwrap();

        assert!(first < failed && failed < last);
        assert!(rendered.contains("voice-b"));
        assert!(rendered.contains("mythe"));
    }

    #[test]
    fn repeated_hooks_are_counted() {
        assert_eq!(duplicate_hook_count(&[video("a"), video("b")]), 1);
        assert_eq!(duplicate_hook_count(&[video("a")]), 0);
    }
}
