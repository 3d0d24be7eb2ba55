use anyhow::Result;
use std::process::Command;

use super::common::TestEnvironment;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run the built binary against the environment's config, with no
/// credentials leaking in from the caller's shell.
pub fn run_engine_command(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    let output = Command::new(env!("CARGO_BIN_EXE_content-engine"))
        .arg("--config")
        .arg(env.config_path())
        .arg("--no-color")
        .args(args)
        .current_dir(env.path())
        .env("HOME", env.path())
        .env("XDG_CONFIG_HOME", env.path().join("xdg-config"))
        .env("XDG_DATA_HOME", env.path().join("xdg-data"))
        .env("XDG_CACHE_HOME", env.path().join("xdg-cache"))
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_TTS_API_KEY")
        .env_remove("ELEVENLABS_API_KEY")
        .env_remove("ELEVENLABS_VOICE_ID")
        .env_remove("PEXELS_API_KEY")
        .output()?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Parse every stdout line of a `--output json` run.
pub fn json_events(output: &CommandOutput) -> Vec<serde_json::Value> {
    output
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
