//! Caption alignment
//!
//! Maps approved script sentences onto the timing of a speech-recognition
//! pass over the synthesized audio. Cue text always comes from the script;
//! the recognizer only contributes timing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("script contains no sentence to caption")]
    EmptyScript,
    #[error("cannot align an empty sentence list")]
    NoSentences,
}

/// Tunables for the proportional redistribution branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentParams {
    /// A cue start snaps to a recognized segment start closer than this (seconds).
    pub snap_threshold: f64,
    /// Audio duration assumed when the recognizer returned nothing.
    pub fallback_duration: f64,
    pub min_cue: f64,
    pub max_cue: f64,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            snap_threshold: 1.0,
            fallback_duration: 30.0,
            min_cue: 1.5,
            max_cue: 6.0,
        }
    }
}

/// One timed unit from the recognizer. `text` is kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

impl RecognizedSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// A timed subtitle unit; `index` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Total duration the cues must fit in.
pub fn audio_span(segments: &[RecognizedSegment], params: &AlignmentParams) -> f64 {
    segments
        .last()
        .map(|segment| segment.end)
        .filter(|end| end.is_finite() && *end > 0.0)
        .unwrap_or(params.fallback_duration)
}

/// Produce exactly one cue per sentence, in input order.
pub fn align(
    sentences: &[String],
    segments: &[RecognizedSegment],
    params: &AlignmentParams,
) -> Result<Vec<CaptionCue>, AlignmentError> {
    if sentences.is_empty() {
        return Err(AlignmentError::NoSentences);
    }

    let cues = if segments.is_empty() {
        spread_evenly(sentences, params.fallback_duration)
    } else if segments.len() == sentences.len() {
        sentences
            .iter()
            .zip(segments)
            .enumerate()
            .map(|(i, (text, segment))| CaptionCue {
                index: i + 1,
                start: segment.start,
                end: segment.end,
                text: text.clone(),
            })
            .collect()
    } else {
        redistribute(sentences, segments, params)
    };

    Ok(cues)
}

fn spread_evenly(sentences: &[String], total: f64) -> Vec<CaptionCue> {
    let step = total / sentences.len() as f64;
    sentences
        .iter()
        .enumerate()
        .map(|(i, text)| CaptionCue {
            index: i + 1,
            start: i as f64 * step,
            end: (i + 1) as f64 * step,
            text: text.clone(),
        })
        .collect()
}

fn redistribute(
    sentences: &[String],
    segments: &[RecognizedSegment],
    params: &AlignmentParams,
) -> Vec<CaptionCue> {
    let total = audio_span(segments, params);
    let lengths: Vec<usize> = sentences.iter().map(|s| s.chars().count()).collect();
    let total_chars: usize = lengths.iter().sum();

    let mut current = 0.0_f64;
    let mut cues = Vec::with_capacity(sentences.len());

    for (i, (text, chars)) in sentences.iter().zip(&lengths).enumerate() {
        let share = if total_chars == 0 {
            1.0 / sentences.len() as f64
        } else {
            *chars as f64 / total_chars as f64
        };
        let span = (share * total).clamp(params.min_cue, params.max_cue);

        let end = (current + span).min(total).max(current);
        // Snapping moves a start forward inside [current, end] only
        let start = match nearest_segment_start(segments, current) {
            Some(candidate) if (candidate - current).abs() < params.snap_threshold => {
                candidate.clamp(current, end)
            }
            _ => current,
        };

        cues.push(CaptionCue {
            index: i + 1,
            start,
            end,
            text: text.clone(),
        });
        current = end;
    }

    cues
}

fn nearest_segment_start(segments: &[RecognizedSegment], at: f64) -> Option<f64> {
    segments
        .iter()
        .map(|segment| segment.start)
        .filter(|start| start.is_finite())
        .min_by(|a, b| (a - at).abs().total_cmp(&(b - at).abs()))
}
