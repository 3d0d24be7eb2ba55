//! Sequential batch loop with per-item failure isolation.

use std::collections::HashSet;

use anyhow::{Result, bail};
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::json;

use crate::ui::prelude::*;
use crate::video::model::{ContentFormat, RenderedVideo};

/// Anti-duplicate state carried from one batch item to the next.
#[derive(Debug, Default, Clone)]
pub struct BatchState {
    /// Background keys already rendered in this batch
    pub used_backgrounds: HashSet<String>,
    /// Hooks of completed scripts, oldest first
    pub recent_hooks: Vec<String>,
    used_voices: HashSet<String>,
    last_voice: Option<String>,
}

impl BatchState {
    /// Pick the next voice: never the previous one when another exists,
    /// preferring voices not yet heard in this batch.
    pub fn next_voice<R: Rng + ?Sized>(&mut self, pool: &[String], rng: &mut R) -> Option<String> {
        let candidates: Vec<&String> = pool
            .iter()
            .filter(|voice| self.last_voice.as_ref() != Some(*voice))
            .collect();
        let unused: Vec<&String> = candidates
            .iter()
            .copied()
            .filter(|voice| !self.used_voices.contains(*voice))
            .collect();

        let picked = if !unused.is_empty() {
            unused.choose(rng).copied()
        } else if !candidates.is_empty() {
            candidates.choose(rng).copied()
        } else {
            pool.first()
        };
        let voice = picked?.clone();

        self.used_voices.insert(voice.clone());
        self.last_voice = Some(voice.clone());
        Some(voice)
    }

    /// Remember what a finished item used.
    pub fn record(&mut self, video: &RenderedVideo) {
        self.recent_hooks.push(video.script.hook.clone());
        self.used_backgrounds.insert(video.background.clone());
    }
}

#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// 1-based position in the batch
    pub number: usize,
    pub format: ContentFormat,
    pub error: String,
}

#[derive(Debug)]
pub struct BatchReport<T> {
    pub total: usize,
    pub completed: Vec<T>,
    pub failures: Vec<BatchFailure>,
}

impl<T> BatchReport<T> {
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// The format of each of `count` items, cycling through `formats`.
pub fn plan_formats(formats: &[ContentFormat], count: usize) -> Vec<ContentFormat> {
    formats.iter().copied().cycle().take(count).collect()
}

/// Run `produce` for every item in order. Item errors are logged and
/// counted; only an empty batch is an error.
pub fn run_batch<T, F>(formats: &[ContentFormat], mut produce: F) -> Result<BatchReport<T>>
where
    F: FnMut(usize, ContentFormat) -> Result<T>,
{
    if formats.is_empty() {
        bail!("Batch is empty: request at least one item");
    }

    let total = formats.len();
    let mut report = BatchReport {
        total,
        completed: Vec::with_capacity(total),
        failures: Vec::new(),
    };

    for (index, format) in formats.iter().copied().enumerate() {
        let number = index + 1;
        separator(false);
        emit(
            Level::Info,
            "pipeline.item.start",
            &format!("Video {number}/{total} [{format}]"),
            Some(json!({ "number": number, "total": total, "format": format })),
        );

        match produce(number, format) {
            Ok(item) => report.completed.push(item),
            Err(err) => {
                emit(
                    Level::Error,
                    "pipeline.item.failed",
                    &format!("Video {number}/{total} [{format}] failed: {err:#}"),
                    Some(json!({
                        "number": number,
                        "format": format,
                        "error": format!("{err:#}"),
                    })),
                );
                report.failures.push(BatchFailure {
                    number,
                    format,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    Ok(report)
}

/// Hooks repeated among completed videos, compared case-insensitively.
pub fn duplicate_hook_count(videos: &[RenderedVideo]) -> usize {
    let unique: HashSet<String> = videos
        .iter()
        .map(|video| video.script.hook.trim().to_lowercase())
        .collect();
    videos.len() - unique.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::video::subtitles::AlignmentError;

    fn voices(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn partial_failure_is_counted_not_raised() {
        let formats = plan_formats(&[ContentFormat::Tuto, ContentFormat::Mythe], 10);

        let report = run_batch(&formats, |number, _format| {
            if number == 4 {
                Err(anyhow!(AlignmentError::EmptyScript))
            } else {
                Ok(number)
            }
        })
        .unwrap();

        assert_eq!(report.total, 10);
        assert_eq!(report.completed_count(), 9);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failures[0].number, 4);
        assert_eq!(report.failures[0].format, ContentFormat::Mythe);
        assert!(!report.completed.contains(&4));
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(run_batch::<(), _>(&[], |_, _| Ok(())).is_err());
    }

    #[test]
    fn formats_cycle_in_order() {
        let plan = plan_formats(&[ContentFormat::Scandale, ContentFormat::Tuto], 5);
        assert_eq!(
            plan,
            vec![
                ContentFormat::Scandale,
                ContentFormat::Tuto,
                ContentFormat::Scandale,
                ContentFormat::Tuto,
                ContentFormat::Scandale,
            ]
        );
        assert!(plan_formats(&[], 3).is_empty());
    }

    #[test]
    fn voices_never_repeat_back_to_back() {
        let pool = voices(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = BatchState::default();

        let picks: Vec<String> = (0..12)
            .map(|_| state.next_voice(&pool, &mut rng).unwrap())
            .collect();

        for pair in picks.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        let first_three: HashSet<&String> = picks[..3].iter().collect();
        assert_eq!(first_three.len(), 3);
    }

    #[test]
    fn single_voice_pool_repeats_and_empty_pool_yields_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = BatchState::default();
        let pool = voices(&["solo"]);

        assert_eq!(state.next_voice(&pool, &mut rng).as_deref(), Some("solo"));
        assert_eq!(state.next_voice(&pool, &mut rng).as_deref(), Some("solo"));
        assert_eq!(state.next_voice(&[], &mut rng), None);
    }
}
