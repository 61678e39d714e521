use crate::error::{Error, Result};
use crate::index::types::Limits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "fuzzmap";
const CONFIG_FILE: &str = "config.json";
const DATABASES_DIR: &str = "databases";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "FUZZMAP_DATA_DIR";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the server binds to
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between periodic saves of dirty databases
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,

    /// Cached FIND results per database
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default)]
    pub limits: Limits,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    12021
}

fn default_save_interval_secs() -> u64 {
    60
}

fn default_cache_size() -> usize {
    128
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            save_interval_secs: default_save_interval_secs(),
            cache_size: default_cache_size(),
            limits: Limits::default(),
        }
    }
}

impl AppConfig {
    /// Load `config.json` from `data_dir`, or return defaults if not found
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(&config_path).map_err(|e| Error::io(&config_path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", config_path.display(), e)))
    }

    /// Save config to `data_dir`
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let config_path = data_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&config_path, content).map_err(|e| Error::io(&config_path, e))
    }
}

/// Resolve the data directory from, in order of priority:
/// an explicit path, `FUZZMAP_DATA_DIR`, then the platform data directory.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let root = if let Some(path) = explicit {
        path.to_path_buf()
    } else if let Ok(val) = std::env::var(DATA_DIR_ENV) {
        PathBuf::from(val)
    } else {
        get_app_data_dir()?
    };

    fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
    Ok(root)
}

/// Platform application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    base.map(|b| b.join(APP_NAME))
        .ok_or_else(|| Error::Config("could not determine app data directory".into()))
}

/// Directory holding `<name>.trigrams` files under a data directory
pub fn databases_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASES_DIR)
}
