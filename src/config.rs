//! TOML-based configuration system.
//!
//! Every struct implements `Default`, so a missing or partial config file
//! falls back to the stock behavior field by field.
//!
//! ## Config file search order
//!
//! 1. `TABSHELL_CONFIG` environment variable (explicit override)
//! 2. Next to the executable (`<exe_dir>/config.toml`)
//! 3. Platform config directory (`%APPDATA%\TabShell\config.toml` on Windows)
//! 4. Current working directory (`./config.toml`)
//! 5. No file found → `Config::default()`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::address::{DEFAULT_SEARCH_TEMPLATE, Destination};
use crate::isolation::{CapabilitySet, IsolationPolicy, IsolationPreset};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read or write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub search: SearchConfig,
    pub isolation: IsolationConfig,
    pub bookmarks: BookmarksConfig,
}

/// General shell settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub window_title: String,
    /// Address opened by new tabs. Resolved like address-bar input.
    pub home_page: String,
}

/// Search engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// `{query}` is replaced by the percent-encoded query.
    pub template: String,
}

/// Isolation layering policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    pub preset: IsolationPreset,
    /// Overrides the preset's layer count when set.
    pub layers: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarksConfig {
    /// Start with the stock bookmark list instead of an empty one.
    pub seed_defaults: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Default impls
// ─────────────────────────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            window_title: "TabShell".to_string(),
            home_page: Destination::new_tab().to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_SEARCH_TEMPLATE.to_string(),
        }
    }
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            preset: IsolationPreset::Standard,
            layers: None,
        }
    }
}

impl Default for BookmarksConfig {
    fn default() -> Self {
        Self {
            seed_defaults: true,
        }
    }
}

impl IsolationConfig {
    /// Policy selected by this section.
    pub fn policy(&self) -> IsolationPolicy {
        let preset = IsolationPolicy::from_preset(self.preset);
        match self.layers {
            Some(layers) => IsolationPolicy::new(layers, preset.capabilities()),
            None => preset,
        }
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.policy().capabilities()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config loading and saving
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Loads configuration from the standard locations. Never fails:
    /// returns defaults if no file is found or if it cannot be used.
    pub fn load() -> Self {
        match find_config_path() {
            Some(path) => match Self::load_from(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "Configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "Unusable config, using defaults");
                    Config::default()
                }
            },
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves configuration to the platform config directory.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = save_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Saves to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// Searches for a config file in the standard locations.
fn find_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TABSHELL_CONFIG") {
        let p = PathBuf::from(path);
        if p.is_file() {
            return Some(p);
        }
        warn!(path = %p.display(), "TABSHELL_CONFIG points to a missing file");
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    if let Some(dir) = platform_config_dir() {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    let p = PathBuf::from("config.toml");
    p.is_file().then_some(p)
}

/// Returns the platform-specific save path for the config file.
fn save_path() -> PathBuf {
    platform_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("TabShell"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| format!("{h}/.config")))
            .map(|dir| PathBuf::from(dir).join("tabshell"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query param parsing (settings page save action)
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Applies `key=value&key=value` pairs on top of `self`.
    /// Unknown keys and unparseable values are ignored.
    pub fn with_query_params(mut self, query: &str) -> Self {
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = url_decode(value);

            match key {
                "window_title" => self.general.window_title = value,
                "home_page" => self.general.home_page = value,
                "search_template" => self.search.template = value,
                "isolation_preset" => match value.as_str() {
                    "standard" => self.isolation.preset = IsolationPreset::Standard,
                    "nested" => self.isolation.preset = IsolationPreset::Nested,
                    _ => {}
                },
                "isolation_layers" => {
                    self.isolation.layers = value.parse().ok();
                }
                "seed_bookmarks" => self.bookmarks.seed_defaults = value == "true",
                _ => {}
            }
        }
        self
    }

    /// Builds a Config from query parameters over defaults.
    pub fn from_query_params(query: &str) -> Self {
        Config::default().with_query_params(query)
    }
}

/// Percent-decoding for form values (`+` is a space).
fn url_decode(s: &str) -> String {
    url::form_urlencoded::parse(format!("v={s}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
