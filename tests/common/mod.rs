use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated config, output and cache directories for one test.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let env = Self {
            temp_dir: tempfile::tempdir()?,
        };
        fs::write(env.config_path(), env.config_toml())?;
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("output")
    }

    fn config_toml(&self) -> String {
        format!(
            "output_dir = {:?}\nassets_dir = {:?}\ncache_dir = {:?}\nstock_cache_enabled = true\n",
            self.output_dir().display().to_string(),
            self.path().join("assets").display().to_string(),
            self.path().join("cache").display().to_string(),
        )
    }

    /// Write `contents` to a file under the test directory.
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}
