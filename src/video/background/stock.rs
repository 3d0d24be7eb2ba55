//! Remote stock footage search (Pexels)

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::video::retry::ServiceError;

const SEARCH_URL: &str = "https://api.pexels.com/videos/search";
const SERVICE: &str = "pexels";

/// Preferred rendition height band.
const TARGET_HEIGHT: (u32, u32) = (600, 800);
pub const RESULTS_PER_PAGE: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct StockVideo {
    pub id: u64,
    #[serde(default)]
    pub video_files: Vec<StockVideoFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockVideoFile {
    pub link: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<StockVideo>,
}

impl StockVideo {
    /// Name of the local copy, shared by the download and the cache.
    pub fn file_name(&self) -> String {
        format!("pexels_{}.mp4", self.id)
    }

    /// Rendition closest to the target height band, smaller heights winning ties.
    pub fn best_file(&self) -> Option<&StockVideoFile> {
        self.video_files
            .iter()
            .filter(|file| !file.link.is_empty())
            .min_by_key(|file| {
                let height = file.height.unwrap_or(u32::MAX);
                (band_distance(height), height)
            })
    }
}

fn band_distance(height: u32) -> u32 {
    let (low, high) = TARGET_HEIGHT;
    if height < low {
        low - height
    } else {
        height.saturating_sub(high)
    }
}

/// Searchable footage library.
pub trait StockVideoSearch {
    fn search(&self, query: &str) -> Result<Vec<StockVideo>, ServiceError>;

    /// Download `file` to `dest`; `dest` only appears once complete.
    fn download(&self, file: &StockVideoFile, dest: &Path) -> Result<(), ServiceError>;
}

pub struct PexelsClient {
    client: Client,
    api_key: String,
    search_timeout: Duration,
    download_timeout: Duration,
}

impl PexelsClient {
    pub fn new(
        api_key: impl Into<String>,
        search_timeout: Duration,
        download_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .build()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            search_timeout,
            download_timeout,
        })
    }
}

impl StockVideoSearch for PexelsClient {
    fn search(&self, query: &str) -> Result<Vec<StockVideo>, ServiceError> {
        let per_page = RESULTS_PER_PAGE.to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("query", query),
                ("orientation", "portrait"),
                ("per_page", per_page.as_str()),
            ])
            .header(AUTHORIZATION, &self.api_key)
            .timeout(self.search_timeout)
            .send()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(SERVICE, status, &body));
        }

        let parsed: SearchResponse = response
            .json()
            .map_err(|err| ServiceError::malformed(SERVICE, err.to_string()))?;
        Ok(parsed.videos)
    }

    fn download(&self, file: &StockVideoFile, dest: &Path) -> Result<(), ServiceError> {
        let io_error = |err: std::io::Error| ServiceError::Transport {
            service: SERVICE,
            detail: format!("writing {}: {err}", dest.display()),
        };

        let mut response = self
            .client
            .get(&file.link)
            .timeout(self.download_timeout)
            .send()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(SERVICE, status, &body));
        }

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(io_error)?;
        let mut partial = NamedTempFile::new_in(dir).map_err(io_error)?;
        response
            .copy_to(partial.as_file_mut())
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;
        partial.persist(dest).map_err(|err| io_error(err.error))?;
        Ok(())
    }
}
