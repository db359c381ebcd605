//! TOML-based configuration system.
//!
//! Loads settings from a `config.toml` file, falling back to defaults that
//! match the browser's hardcoded blur values. Every struct implements
//! `Default` so a missing or partial config file still produces a working
//! guard.
//!
//! ## Config file search order
//!
//! 1. `BLURGUARD_CONFIG` environment variable (explicit override)
//! 2. Next to the executable (`<exe_dir>/config.toml`)
//! 3. Platform config directory (`%APPDATA%\BlurGuard\config.toml` on Windows)
//! 4. Current working directory (`./config.toml`)
//! 5. No file found → `Config::default()`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blur::BlurParams;

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub blur: BlurParams,
    pub auth: AuthConfig,
    pub window: WindowConfig,
}

/// Authentication challenge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Offer biometrics before the passcode when enrolled.
    pub allow_biometrics: bool,
    /// Text shown by the challenger.
    pub prompt_reason: String,
    /// Authentication metadata file. Empty = platform config directory.
    pub store_path: String,
}

/// Demo host window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_biometrics: true,
            prompt_reason: "Authenticate to view this screen".to_string(),
            store_path: String::new(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 800,
            title: "BlurGuard".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config loading and saving
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Loads configuration from a TOML file. Never panics — returns defaults
    /// if no file is found or if parsing fails.
    pub fn load() -> Self {
        match find_config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        }
    }

    /// Loads one specific file, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => {
                    info!(path = %path.display(), "Configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                    Config::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read config, using defaults");
                Config::default()
            }
        }
    }

    /// Saves configuration to the platform config directory and returns the
    /// written path.
    pub fn save(&self) -> io::Result<PathBuf> {
        let path = save_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Resolved location of the authentication metadata file.
    pub fn auth_store_path(&self) -> PathBuf {
        if self.auth.store_path.is_empty() {
            platform_config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("auth.toml")
        } else {
            PathBuf::from(&self.auth.store_path)
        }
    }
}

/// Searches for a config file in the standard locations.
fn find_config_path() -> Option<PathBuf> {
    // 1. Explicit env var override
    if let Ok(path) = std::env::var("BLURGUARD_CONFIG") {
        let p = PathBuf::from(path);
        if p.is_file() {
            return Some(p);
        }
    }

    // 2. Next to the executable
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 3. Platform config directory
    if let Some(dir) = platform_config_dir() {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 4. Current working directory
    let p = PathBuf::from("config.toml");
    if p.is_file() {
        return Some(p);
    }

    None
}

/// Returns the platform-specific save path for the config file.
fn save_path() -> PathBuf {
    platform_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Returns the platform config directory without adding a dependency.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("BlurGuard"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| format!("{h}/.config")))
            .map(|dir| PathBuf::from(dir).join("blurguard"))
    }
}
