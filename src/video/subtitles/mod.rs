//! Caption generation: sentence splitting, alignment and serialization.

pub mod align;
pub mod ass;
pub mod sentences;
pub mod srt;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub use align::{AlignmentError, AlignmentParams, CaptionCue, RecognizedSegment, align};
pub use ass::{AssTheme, generate_ass_file};
pub use sentences::split_sentences;
pub use srt::{parse_srt, to_srt};

/// Split `full_text` and align it onto the recognizer output.
pub fn build_cues(
    full_text: &str,
    segments: &[RecognizedSegment],
    params: &AlignmentParams,
) -> Result<Vec<CaptionCue>, AlignmentError> {
    let sentences = split_sentences(full_text)?;
    align(&sentences, segments, params)
}

pub fn write_srt(cues: &[CaptionCue], path: &Path) -> Result<()> {
    write_track(path, &to_srt(cues))
}

pub fn write_ass(cues: &[CaptionCue], play_res: (u32, u32), path: &Path) -> Result<()> {
    write_track(path, &generate_ass_file(cues, &AssTheme::default(), play_res))
}

fn write_track(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating subtitle directory {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("writing subtitles to {}", path.display()))
}
