//! Configuration system for sbsync.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SBSYNC_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/sbsync/config.toml
//!   3. ~/.config/sbsync/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SbsyncConfig {
    /// Blocklists to maintain. Each gets its own chunk log.
    pub lists: Vec<String>,
    pub storage: StorageConfig,
    pub update: UpdateConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one `<list>.dat` chunk log per list.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Seconds between update cycles.
    pub interval_secs: u64,
    /// Directory that relative delta source locations resolve against.
    /// Defaults to `<data_dir>/incoming`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<PathBuf>,
    /// Lifetime of a cached full-hash verification, in seconds.
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Local HTTP API port.
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SbsyncConfig {
    fn default() -> Self {
        Self {
            lists: vec![
                "goog-malware-shavar".to_string(),
                "googpub-phish-shavar".to_string(),
            ],
            storage: StorageConfig::default(),
            update: UpdateConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: data_dir(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1800,
            source_root: None,
            cache_ttl_secs: 45 * 60,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 9191 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// `$<xdg_var>/sbsync`, else `$HOME/<fallback>/sbsync`.
fn xdg_dir(xdg_var: &str, fallback: &[&str]) -> PathBuf {
    let base = std::env::var_os(xdg_var)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"));
            fallback.iter().fold(home, |dir, part| dir.join(part))
        });
    base.join("sbsync")
}

/// Default directory for chunk logs.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize default config")]
    Serialize(#[source] toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SbsyncConfig {
    /// Load config from [`SbsyncConfig::file_path`], then apply `SBSYNC_*`
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path(), |key| std::env::var(key).ok())
    }

    /// Load config from `path`; a missing file means defaults. Overrides are
    /// read through `var`.
    pub fn load_from(
        path: &Path,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: SbsyncConfig = match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SbsyncConfig::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_env_overrides(var);
        Ok(config)
    }

    /// `$SBSYNC_CONFIG`, else `config.toml` under the XDG config dir.
    pub fn file_path() -> PathBuf {
        std::env::var_os("SBSYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| xdg_dir("XDG_CONFIG_HOME", &[".config"]).join("config.toml"))
    }

    /// Write the default config to [`SbsyncConfig::file_path`] unless a file
    /// is already there. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    /// Returns true if a file was written.
    pub fn write_default_to(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let text =
            toml::to_string_pretty(&SbsyncConfig::default()).map_err(ConfigError::Serialize)?;
        std::fs::write(path, text).map_err(write_err)?;
        Ok(true)
    }

    /// Path of the chunk log backing `list`.
    pub fn log_path(&self, list: &str) -> PathBuf {
        self.storage.data_dir.join(format!("{list}.dat"))
    }

    /// Directory that relative delta source locations resolve against.
    /// Follows `data_dir` unless set explicitly.
    pub fn source_root(&self) -> PathBuf {
        self.update
            .source_root
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("incoming"))
    }

    /// Apply SBSYNC_* overrides, reading variables through `var`.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("SBSYNC_STORAGE__DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("SBSYNC_UPDATE__INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                self.update.interval_secs = secs;
            }
        }
        if let Some(v) = var("SBSYNC_UPDATE__SOURCE_ROOT") {
            self.update.source_root = Some(PathBuf::from(v));
        }
        if let Some(v) = var("SBSYNC_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
        if let Some(v) = var("SBSYNC_LISTS") {
            self.lists = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }
}
