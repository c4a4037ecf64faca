use std::time::Duration;
use std::{env, fmt, fs, path};

use logger::{LevelFilter, LogFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::prober::ProbeKind;
use crate::monitoring::validation::{validate_timeout, validate_update_interval};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("could not determine a default {0} directory")]
    PathUnavailable(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub storage: Storage,
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    /// Seconds between two probing rounds
    pub update_interval_seconds: f64,
    pub probe: ProbeKind,
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Directory holding the segment tables, down logs and registry
    pub directory: Option<path::PathBuf>,

    /// Registry file, defaults to `addresses.json` in the storage directory
    pub registry: Option<path::PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub format: LogFormat,
}

impl Default for Monitor {
    fn default() -> Self {
        Self { update_interval_seconds: 60.0, probe: ProbeKind::Icmp, probe_timeout_seconds: 5 }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::Compact }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/statewatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable("config"));
    };

    Ok(path.join("statewatch/config.toml"))
}

/// Get default storage directory ($XDG_DATA_HOME/statewatch or
/// $HOME/.local/share/statewatch)
fn default_storage_dir() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(data_home) = env::var("XDG_DATA_HOME") {
        path::PathBuf::from(data_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".local/share")
    } else {
        return Err(ConfigError::PathUnavailable("storage"));
    };

    Ok(path.join("statewatch"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };
        let or_default = |path: &Option<path::PathBuf>| match path {
            Some(path) => path.display().to_string(),
            None => "(default)".to_string(),
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Update Interval (s)", &self.monitor.update_interval_seconds)?;
        write_1(f, "Probe", &self.monitor.probe)?;
        write_1(f, "Probe Timeout (s)", &self.monitor.probe_timeout_seconds)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Directory", &or_default(&self.storage.directory))?;
        write_1(f, "Registry", &or_default(&self.storage.registry))?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &format!("{:?}", self.logging.format).to_lowercase())?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/statewatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// let cfg = statewatch::config::Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), statewatch::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| ConfigError::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed =
            |source: std::io::Error| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_update_interval(self.monitor.update_interval_seconds)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        validate_timeout(self.monitor.probe_timeout_seconds)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.log_level()?;
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.monitor.update_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.probe_timeout_seconds)
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        self.logging
            .level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level: {}", self.logging.level)))
    }

    pub fn storage_dir(&self) -> Result<path::PathBuf, ConfigError> {
        match &self.storage.directory {
            Some(directory) => Ok(directory.clone()),
            None => default_storage_dir(),
        }
    }

    /// Registry path, relative to `storage_dir` unless configured
    pub fn registry_path(&self, storage_dir: &path::Path) -> path::PathBuf {
        self.storage.registry.clone().unwrap_or_else(|| storage_dir.join("addresses.json"))
    }
}
