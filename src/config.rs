use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::release::api::{DEFAULT_API_BASE_URL, DEFAULT_CHANNEL, DEFAULT_DOWNLOAD_BASE_URL};
use crate::scan::{DEFAULT_FLOOR_VERSION, DEFAULT_IGNORE_DIRS};

/// Name of the data directory under the platform data home
const APP_DIR: &str = "wpvc";

/// Checker configuration, read from `config.json` in the data directory
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Version-check channel (`beta` also offers pre-releases)
    pub channel: String,
    /// Release the version-check API should pretend exists
    pub pretend_release: Option<String>,
    /// Baseline the resolved minimum version starts from
    pub floor_version: String,
    /// Directory names skipped while scanning plugins
    pub ignore_dirs: Vec<String>,
    /// PHP interpreter used to confirm compatibility shims
    pub php_binary: String,
    /// Match `$obj->method()` when exactly one class declares `method`
    pub match_unknown_receivers: bool,
    pub api_base_url: String,
    pub download_base_url: String,
    pub debug: DebugConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            pretend_release: None,
            floor_version: DEFAULT_FLOOR_VERSION.to_string(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
            php_binary: "php".to_string(),
            match_unknown_receivers: true,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            debug: DebugConfig::default(),
        }
    }
}

/// Switches for inspecting a run
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DebugConfig {
    /// Keep downloaded release archives and reuse them
    pub keep_zip: bool,
    /// Keep the extracted release tree after indexing
    pub keep_data: bool,
    /// Ignore cached extraction results
    pub no_cache: bool,
}

impl Settings {
    /// Read settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the path to the data directory for wpvc.
/// Uses $XDG_DATA_HOME/wpvc if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/wpvc,
/// or ./wpvc if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the persisted version index.
pub fn index_path(data_dir: &Path) -> PathBuf {
    data_dir.join("since_data.json")
}

/// Returns the path to the index-building cache.
pub fn cache_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".cache").join("wp_cache.json")
}

/// Returns the path to the settings file.
pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}

/// Name of the log file written into the data directory.
pub const LOG_FILE: &str = "wpvc.log";

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join(APP_DIR)
}
