use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

use super::pool::list_clips;
use crate::ui::prelude::*;
use crate::video::model::ContentFormat;

/// Persistent per-category store of downloaded stock clips.
///
/// Single writer: only the producing process touches it, so no locking.
#[derive(Debug, Clone)]
pub struct StockCache {
    root: PathBuf,
    max_per_category: usize,
}

impl StockCache {
    pub fn new(root: impl Into<PathBuf>, max_per_category: usize) -> Self {
        Self {
            root: root.into(),
            max_per_category: max_per_category.max(1),
        }
    }

    pub fn dir_for(&self, format: ContentFormat) -> PathBuf {
        self.root.join(format.as_str())
    }

    pub fn entries(&self, format: ContentFormat) -> Vec<PathBuf> {
        list_clips(&self.dir_for(format))
    }

    /// Cached copy of `file_name`, if present.
    pub fn lookup(&self, format: ContentFormat, file_name: &str) -> Option<PathBuf> {
        let path = self.dir_for(format).join(file_name);
        path.is_file().then_some(path)
    }

    /// Copy `source` into the category directory and enforce the size bound.
    pub fn store(&self, format: ContentFormat, source: &Path) -> Result<PathBuf> {
        let dir = self.dir_for(format);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let file_name = source
            .file_name()
            .with_context(|| format!("{} has no file name", source.display()))?;
        let dest = dir.join(file_name);
        if !dest.exists() {
            fs::copy(source, &dest).with_context(|| {
                format!("Failed to copy {} into {}", source.display(), dir.display())
            })?;
        }

        self.evict(format, &dest)?;
        Ok(dest)
    }

    /// Remove oldest-modified entries above the bound, never removing `keep`.
    fn evict(&self, format: ContentFormat, keep: &Path) -> Result<()> {
        let mut entries: Vec<(SystemTime, PathBuf)> = self
            .entries(format)
            .into_iter()
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, path)
            })
            .collect();
        entries.sort();

        let excess = entries.len().saturating_sub(self.max_per_category);
        for (_, path) in entries.into_iter().filter(|(_, path)| path != keep).take(excess) {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to evict cached clip {}", path.display()))?;
            emit(
                Level::Debug,
                "background.cache.evicted",
                &format!("Evicted {}", path.display()),
                None,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    fn clip_with_age(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        let modified = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
        path
    }

    #[test]
    fn store_copies_and_evicts_oldest() {
        let root = tempdir().unwrap();
        let downloads = tempdir().unwrap();
        let cache = StockCache::new(root.path(), 2);
        let dir = cache.dir_for(ContentFormat::Scandale);
        let oldest = clip_with_age(&dir, "pexels_1.mp4", 300);
        let newer = clip_with_age(&dir, "pexels_2.mp4", 100);
        let fresh = clip_with_age(downloads.path(), "pexels_3.mp4", 0);

        let stored = cache.store(ContentFormat::Scandale, &fresh).unwrap();

        assert_eq!(stored, dir.join("pexels_3.mp4"));
        assert!(!oldest.exists());
        assert!(newer.exists());
        assert_eq!(cache.entries(ContentFormat::Scandale).len(), 2);
    }

    #[test]
    fn categories_are_isolated() {
        let root = tempdir().unwrap();
        let cache = StockCache::new(root.path(), 5);
        clip_with_age(&cache.dir_for(ContentFormat::Tuto), "pexels_9.mp4", 0);

        assert!(cache.entries(ContentFormat::Mythe).is_empty());
        assert!(cache.lookup(ContentFormat::Tuto, "pexels_9.mp4").is_some());
        assert!(cache.lookup(ContentFormat::Mythe, "pexels_9.mp4").is_none());
    }

    #[test]
    fn stored_file_survives_even_if_oldest() {
        let root = tempdir().unwrap();
        let downloads = tempdir().unwrap();
        let cache = StockCache::new(root.path(), 1);
        let dir = cache.dir_for(ContentFormat::Tuto);
        clip_with_age(&dir, "pexels_1.mp4", 10);
        let ancient = clip_with_age(downloads.path(), "pexels_2.mp4", 1000);

        let stored = cache.store(ContentFormat::Tuto, &ancient).unwrap();

        // fs::copy keeps the source mtime on some platforms
        assert!(stored.exists());
        assert_eq!(cache.entries(ContentFormat::Tuto), vec![stored]);
    }
}
