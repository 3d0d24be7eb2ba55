use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::{ScriptSource, spoken_text};
use crate::ui::prelude::*;
use crate::video::model::{ContentFormat, Script};

/// Replays an approved script saved as JSON.
#[derive(Debug, Clone)]
pub struct FileScriptSource {
    path: PathBuf,
}

impl FileScriptSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn load_script(path: &Path) -> Result<Script> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script file {}", path.display()))?;
    let mut script: Script = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse script JSON in {}", path.display()))?;

    if script.full_text.trim().is_empty() {
        script.full_text = spoken_text(&script);
    }
    if script.full_text.trim().is_empty() {
        bail!("Script {} has no text to read", path.display());
    }
    Ok(script)
}

pub fn save_script(script: &Script, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(script).context("Failed to serialize script")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

impl ScriptSource for FileScriptSource {
    fn generate(
        &self,
        format: ContentFormat,
        _theme: Option<&str>,
        _recent_hooks: &[String],
    ) -> Result<Script> {
        let script = load_script(&self.path)?;
        if script.format != format {
            emit(
                Level::Warn,
                "script.file.format_mismatch",
                &format!(
                    "{} is a {} script; keeping its own format instead of {format}",
                    self.path.display(),
                    script.format
                ),
                None,
            );
        }
        Ok(script)
    }
}
