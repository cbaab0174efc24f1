use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub storage: Option<StorageConfig>,
    pub search: Option<SearchConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the recognition/search service, e.g. "http://localhost:5000".
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding history.json, favorites.json and stats.json.
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_college: Option<String>,
    pub enable_ai: Option<bool>,
}

/// Platform config directory path: `<config_dir>/quizlens/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("quizlens").join("config.toml"))
}

/// Platform data directory path: `<data_dir>/quizlens`.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("quizlens"))
}

/// Load config by cascading CWD `.quizlens.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".quizlens.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            base_url: overlay
                .server
                .as_ref()
                .and_then(|s| s.base_url.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.base_url.clone())),
            timeout_secs: overlay
                .server
                .as_ref()
                .and_then(|s| s.timeout_secs)
                .or_else(|| base.server.as_ref().and_then(|s| s.timeout_secs)),
        }),
        storage: Some(StorageConfig {
            data_dir: overlay
                .storage
                .as_ref()
                .and_then(|s| s.data_dir.clone())
                .or_else(|| base.storage.as_ref().and_then(|s| s.data_dir.clone())),
        }),
        search: Some(SearchConfig {
            default_college: overlay
                .search
                .as_ref()
                .and_then(|s| s.default_college.clone())
                .or_else(|| base.search.as_ref().and_then(|s| s.default_college.clone())),
            enable_ai: overlay
                .search
                .as_ref()
                .and_then(|s| s.enable_ai)
                .or_else(|| base.search.as_ref().and_then(|s| s.enable_ai)),
        }),
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(path)
}
