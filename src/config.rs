use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::flashcard::{DEFAULT_INTERVAL_MS, DEFAULT_LEAD_IN_MS};
use crate::quiz::{DEFAULT_DWELL_MS, DEFAULT_SESSION_SIZE};

/// User settings; missing fields take their defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub session_size: usize,
    pub dwell_ms: u64,
    pub flashcard_interval_ms: u64,
    pub flashcard_lead_in_ms: u64,
    pub dictionary: String,
    pub weakest_words_limit: usize,
    pub recent_sessions_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_size: DEFAULT_SESSION_SIZE,
            dwell_ms: DEFAULT_DWELL_MS,
            flashcard_interval_ms: DEFAULT_INTERVAL_MS,
            flashcard_lead_in_ms: DEFAULT_LEAD_IN_MS,
            dictionary: "Level 1".to_string(),
            weakest_words_limit: 10,
            recent_sessions_limit: 10,
        }
    }
}

impl Config {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn flashcard_interval(&self) -> Duration {
        Duration::from_millis(self.flashcard_interval_ms)
    }

    pub fn flashcard_lead_in(&self) -> Duration {
        Duration::from_millis(self.flashcard_lead_in_ms)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "eigo") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("eigo_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Config::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable config, using defaults");
                return Config::default();
            }
        };

        serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "malformed config, using defaults");
            Config::default()
        })
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
