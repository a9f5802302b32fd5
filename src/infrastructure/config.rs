use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::application::notes::NotesLayout;
use crate::domain::{MultiplexerKind, WorkspaceBackend};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VibeConfig {
    #[serde(default)]
    pub multiplexer: MultiplexerKind,
    #[serde(default)]
    pub workspace_backend: WorkspaceBackend,
    #[serde(default = "default_git_poll_interval_secs")]
    pub git_poll_interval_secs: u64,
    #[serde(default)]
    pub notes_layout: NotesLayout,
    #[serde(default)]
    pub session_per_branch: bool,
}

const fn default_git_poll_interval_secs() -> u64 {
    5
}

impl Default for VibeConfig {
    fn default() -> Self {
        Self {
            multiplexer: MultiplexerKind::default(),
            workspace_backend: WorkspaceBackend::default(),
            git_poll_interval_secs: default_git_poll_interval_secs(),
            notes_layout: NotesLayout::default(),
            session_per_branch: false,
        }
    }
}

impl VibeConfig {
    /// Zero would spin the poll loop, so it is clamped to one second.
    pub fn git_poll_interval(&self) -> Duration {
        Duration::from_secs(self.git_poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: VibeConfig,
}

fn config_directory() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir() {
        return Some(path.join("vibeit"));
    }

    dirs::home_dir().map(|path| path.join(".config").join("vibeit"))
}

pub fn config_path() -> Option<PathBuf> {
    config_directory().map(|path| path.join("config.toml"))
}

pub fn load() -> Result<LoadedConfig, String> {
    let path = config_path().ok_or_else(|| "cannot resolve config path".to_string())?;
    let config = load_from_path(&path)?;
    Ok(LoadedConfig { path, config })
}

pub fn load_from_path(path: &Path) -> Result<VibeConfig, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(VibeConfig::default());
        }
        Err(error) => return Err(format!("config read failed: {error}")),
    };

    toml::from_str::<VibeConfig>(&raw).map_err(|error| format!("config parse failed: {error}"))
}
