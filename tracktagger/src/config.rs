//! User configuration file.
//!
//! Read from `~/.config/tracktagger/config.ini` (platform config directory)
//! when present. Every setting has a default and command-line arguments
//! take precedence.
//!
//! ```ini
//! [tools]
//! unrar = unrar
//! sevenzip = 7za
//! metaflac = metaflac
//!
//! [output]
//! directory = ~/Music
//!
//! [processing]
//! jobs = 0
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::{debug, warn};

use crate::input::{ShellExtractor, DEFAULT_SEVENZIP, DEFAULT_UNRAR};
use crate::writer::{ShellReplayGain, DEFAULT_METAFLAC};

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    #[error("failed to read config {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// A value has the wrong type.
    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// External programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub unrar: String,
    pub sevenzip: String,
    pub metaflac: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            unrar: DEFAULT_UNRAR.to_string(),
            sevenzip: DEFAULT_SEVENZIP.to_string(),
            metaflac: DEFAULT_METAFLAC.to_string(),
        }
    }
}

/// Output placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSettings {
    /// Default output directory; the working directory when unset.
    pub directory: Option<PathBuf>,
}

/// Work scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingSettings {
    /// Writer threads; 0 means available parallelism.
    pub jobs: usize,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub tools: ToolSettings,
    pub output: OutputSettings,
    pub processing: ProcessingSettings,
}

impl ConfigFile {
    /// Load from [`config_file_path`], or defaults if there is no file.
    pub fn load() -> ConfigResult<Self> {
        let path = config_file_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Config loaded");
        Self::from_ini(&ini)
    }

    /// Parse configuration text.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::ReadFailed {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            let section = section.unwrap_or_default();
            for (key, value) in properties.iter() {
                config.apply(section, key, value.trim())?;
            }
        }
        Ok(config)
    }

    fn apply(&mut self, section: &str, key: &str, value: &str) -> ConfigResult<()> {
        match (section, key) {
            ("tools", "unrar") => self.tools.unrar = non_empty(value, DEFAULT_UNRAR),
            ("tools", "sevenzip") => self.tools.sevenzip = non_empty(value, DEFAULT_SEVENZIP),
            ("tools", "metaflac") => self.tools.metaflac = non_empty(value, DEFAULT_METAFLAC),
            ("output", "directory") => {
                self.output.directory = (!value.is_empty()).then(|| expand_tilde(value));
            }
            ("processing", "jobs") => {
                self.processing.jobs = value.parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidValue {
                        section: section.to_string(),
                        key: key.to_string(),
                        value: value.to_string(),
                        reason: e.to_string(),
                    }
                })?;
            }
            _ => warn!(section, key, "Unknown config key ignored"),
        }
        Ok(())
    }

    /// Archive extractor using the configured tools.
    pub fn extractor(&self) -> ShellExtractor {
        ShellExtractor::new()
            .with_unrar(self.tools.unrar.clone())
            .with_sevenzip(self.tools.sevenzip.clone())
    }

    /// ReplayGain runner using the configured tool.
    pub fn replaygain(&self) -> ShellReplayGain {
        ShellReplayGain::new(self.tools.metaflac.clone())
    }
}

fn non_empty(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tracktagger")
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}
