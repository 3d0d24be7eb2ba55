use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::video::model::ContentFormat;

const CLIP_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

/// Filename used to track a background across a batch.
pub fn background_key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Pick randomly among candidates not yet used in the batch, falling back to
/// the whole list when every candidate was already used.
pub fn prefer_unused<'a, R: Rng + ?Sized>(
    candidates: &'a [PathBuf],
    used: &HashSet<String>,
    rng: &mut R,
) -> Option<&'a PathBuf> {
    let unused: Vec<&PathBuf> = candidates
        .iter()
        .filter(|path| !used.contains(&background_key(path)))
        .collect();

    if unused.is_empty() {
        candidates.choose(rng)
    } else {
        unused.choose(rng).copied()
    }
}

/// Video files directly inside `dir`, sorted for stable ordering.
pub fn list_clips(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut clips: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_clip(path))
        .collect();
    clips.sort();
    clips
}

fn is_clip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CLIP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Local pool candidates: clips whose name carries a category keyword, or
/// every clip when none does.
pub fn local_candidates(assets_dir: &Path, format: ContentFormat) -> Vec<PathBuf> {
    let clips = list_clips(assets_dir);
    let keywords = format.local_keywords();

    let matching: Vec<PathBuf> = clips
        .iter()
        .filter(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            keywords.iter().any(|keyword| stem.contains(keyword))
        })
        .cloned()
        .collect();

    if matching.is_empty() { clips } else { matching }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"clip").unwrap();
        path
    }

    #[test]
    fn keyword_matches_win_over_other_clips() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "sunset.mp4");
        let paper = touch(dir.path(), "Paper_Stack.MP4");
        touch(dir.path(), "notes.txt");

        let candidates = local_candidates(dir.path(), ContentFormat::Tuto);

        assert_eq!(candidates, vec![paper]);
    }

    #[test]
    fn falls_back_to_any_clip() {
        let dir = tempdir().unwrap();
        let a = touch(dir.path(), "a.mp4");
        let b = touch(dir.path(), "b.mov");

        assert_eq!(local_candidates(dir.path(), ContentFormat::Mythe), vec![a, b]);
    }

    #[test]
    fn missing_directory_yields_nothing() {
        let dir = tempdir().unwrap();
        assert!(local_candidates(&dir.path().join("absent"), ContentFormat::Tuto).is_empty());
    }

    #[test]
    fn unused_candidates_are_preferred() {
        let candidates = vec![PathBuf::from("/bg/road1.mp4"), PathBuf::from("/bg/road2.mp4")];
        let used: HashSet<String> = ["road1.mp4".to_string()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let picked = prefer_unused(&candidates, &used, &mut rng).unwrap();
            assert_eq!(picked, &candidates[1]);
        }
    }

    #[test]
    fn reuses_when_everything_was_used() {
        let candidates = vec![PathBuf::from("/bg/road1.mp4")];
        let used: HashSet<String> = ["road1.mp4".to_string()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(
            prefer_unused(&candidates, &used, &mut rng),
            Some(&candidates[0])
        );
        assert_eq!(prefer_unused(&[], &used, &mut rng), None);
    }
}
