//! Background selection
//!
//! Stages are consulted in order and each one only when the previous yielded
//! nothing: local pool, persistent stock cache, remote stock search, then a
//! generated gradient. Stage failures are logged and fall through, so
//! resolution itself cannot fail.

pub mod cache;
pub mod gradient;
pub mod pool;
pub mod stock;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::ui::prelude::*;
use crate::video::config::EngineConfig;
use crate::video::model::ContentFormat;

pub use cache::StockCache;
pub use gradient::GradientSpec;
pub use pool::background_key;
pub use stock::{PexelsClient, StockVideoSearch};

/// Only the first few search results are considered relevant enough.
const STOCK_SHORTLIST: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOrigin {
    Local,
    Cache,
    Stock,
}

impl fmt::Display for ClipOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClipOrigin::Local => "local",
            ClipOrigin::Cache => "cache",
            ClipOrigin::Stock => "stock",
        })
    }
}

/// Resolved background for one render. Referenced, never copied, by the job.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Clip { path: PathBuf, origin: ClipOrigin },
    /// User-supplied still image, looped for the whole duration.
    Image(PathBuf),
    Gradient(GradientSpec),
}

impl Background {
    /// Identity recorded in the batch's used-backgrounds set.
    pub fn key(&self) -> String {
        match self {
            Background::Clip { path, .. } | Background::Image(path) => background_key(path),
            Background::Gradient(spec) => format!("gradient:{}:{}", spec.top, spec.bottom),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Background::Clip { path, origin } => format!("{origin} clip {}", background_key(path)),
            Background::Image(path) => format!("image {}", background_key(path)),
            Background::Gradient(spec) => format!("gradient {} → {}", spec.top, spec.bottom),
        }
    }
}

pub struct BackgroundResolver {
    assets_dir: PathBuf,
    cache: Option<StockCache>,
    stock: Option<Box<dyn StockVideoSearch>>,
    download_dir: PathBuf,
    frame: (u32, u32),
}

impl BackgroundResolver {
    pub fn new(
        assets_dir: impl Into<PathBuf>,
        cache: Option<StockCache>,
        stock: Option<Box<dyn StockVideoSearch>>,
        download_dir: impl Into<PathBuf>,
        frame: (u32, u32),
    ) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            cache,
            stock,
            download_dir: download_dir.into(),
            frame,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let dirs = config.directories();
        let cache = config
            .stock_cache_enabled
            .then(|| StockCache::new(&dirs.stock_cache, config.stock_cache_max_videos));

        let stock: Option<Box<dyn StockVideoSearch>> = match config.pexels_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {
                match PexelsClient::new(
                    key.trim(),
                    EngineConfig::timeout(config.search_timeout_secs),
                    EngineConfig::timeout(config.download_timeout_secs),
                ) {
                    Ok(client) => Some(Box::new(client)),
                    Err(err) => {
                        emit(
                            Level::Warn,
                            "background.stock.disabled",
                            &format!("Stock search disabled: {err}"),
                            None,
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        Self::new(&dirs.assets, cache, stock, &dirs.work, config.frame_size())
    }

    pub fn has_stock_search(&self) -> bool {
        self.stock.is_some()
    }

    pub fn resolve(
        &self,
        format: ContentFormat,
        duration: f64,
        used: &HashSet<String>,
    ) -> Background {
        self.resolve_with(format, duration, used, &mut rand::thread_rng())
    }

    pub fn resolve_with<R: Rng + ?Sized>(
        &self,
        format: ContentFormat,
        duration: f64,
        used: &HashSet<String>,
        rng: &mut R,
    ) -> Background {
        let local = pool::local_candidates(&self.assets_dir, format);
        if let Some(path) = pool::prefer_unused(&local, used, rng) {
            return self.chosen(path.clone(), ClipOrigin::Local);
        }

        if let Some(cache) = &self.cache {
            let cached = cache.entries(format);
            if let Some(path) = pool::prefer_unused(&cached, used, rng) {
                return self.chosen(path.clone(), ClipOrigin::Cache);
            }
        }

        if let Some(stock) = &self.stock {
            match self.from_stock(stock.as_ref(), format, used, rng) {
                Ok(Some(path)) => return self.chosen(path, ClipOrigin::Stock),
                Ok(None) => emit(
                    Level::Warn,
                    "background.stock.empty",
                    &format!("No stock footage found for {format}"),
                    None,
                ),
                Err(err) => emit(
                    Level::Warn,
                    "background.stock.failed",
                    &format!("Stock footage unavailable: {err:#}"),
                    None,
                ),
            }
        }

        let spec = GradientSpec::for_format(format, duration, self.frame);
        emit(
            Level::Info,
            "background.stage.gradient",
            &format!("Using generated gradient for {format}"),
            None,
        );
        Background::Gradient(spec)
    }

    fn chosen(&self, path: PathBuf, origin: ClipOrigin) -> Background {
        emit(
            Level::Info,
            &format!("background.stage.{origin}"),
            &format!("Using {origin} clip {}", background_key(&path)),
            Some(serde_json::json!({ "path": path.display().to_string() })),
        );
        Background::Clip { path, origin }
    }

    fn from_stock<R: Rng + ?Sized>(
        &self,
        stock: &dyn StockVideoSearch,
        format: ContentFormat,
        used: &HashSet<String>,
        rng: &mut R,
    ) -> Result<Option<PathBuf>> {
        let Some(query) = format.stock_keywords().choose(rng) else {
            return Ok(None);
        };
        emit(
            Level::Debug,
            "background.stock.search",
            &format!("Searching stock footage for '{query}'"),
            None,
        );

        let videos = stock.search(query)?;
        let downloadable: Vec<_> = videos
            .iter()
            .filter(|video| video.best_file().is_some())
            .collect();
        let unused: Vec<_> = downloadable
            .iter()
            .copied()
            .filter(|video| !used.contains(&video.file_name()))
            .collect();
        let picks = if unused.is_empty() { downloadable } else { unused };

        let shortlist = &picks[..picks.len().min(STOCK_SHORTLIST)];
        let Some(video) = shortlist.choose(rng) else {
            return Ok(None);
        };
        let Some(file) = video.best_file() else {
            return Ok(None);
        };
        let file_name = video.file_name();

        if let Some(cache) = &self.cache
            && let Some(cached) = cache.lookup(format, &file_name)
        {
            return Ok(Some(cached));
        }

        let downloaded = self.download_dir.join(&file_name);
        if !downloaded.is_file() {
            stock.download(file, &downloaded)?;
        }

        Ok(Some(self.keep_in_cache(format, &downloaded)))
    }

    fn keep_in_cache(&self, format: ContentFormat, downloaded: &Path) -> PathBuf {
        let Some(cache) = &self.cache else {
            return downloaded.to_path_buf();
        };
        match cache.store(format, downloaded).context("caching stock clip") {
            Ok(stored) => stored,
            Err(err) => {
                emit(
                    Level::Warn,
                    "background.cache.failed",
                    &format!("{err:#}"),
                    None,
                );
                downloaded.to_path_buf()
            }
        }
    }
}
