/// Runtime configuration for the engine and scanner processes.
///
/// Defaults cover the common case. A JSON file named by `ARCSLEUTH_CONFIG`
/// may override any field, and a handful of environment variables override
/// the file.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// JSON configuration file path.
pub const CONFIG_ENV: &str = "ARCSLEUTH_CONFIG";
/// Scanner executable used by the engine.
pub const SCANNER_ENV: &str = "ARCSLEUTH_FS";
/// Maximum log level for whichever process reads it.
pub const LOG_LEVEL_ENV: &str = "ARCSLEUTH_LOG";
/// CSV manifest that switches the scanner to replay mode.
pub const MANIFEST_ENV: &str = "ARCSLEUTH_MANIFEST";

/// Name of the scanner binary looked up next to the engine executable.
pub const SCANNER_BINARY: &str = "arcsleuth-fs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scanner executable. Defaults to `arcsleuth-fs` beside the engine.
    pub scanner_executable: Option<PathBuf>,
    pub log_file: PathBuf,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scanner_executable: None,
            log_file: PathBuf::from("arcsleuth-engine.log"),
            log_level: "info".to_owned(),
        }
    }
}

impl EngineConfig {
    /// The scanner to spawn: configured path, else the sibling binary, else
    /// a bare name resolved through `PATH`.
    pub fn scanner_executable(&self) -> PathBuf {
        if let Some(path) = &self.scanner_executable {
            return path.clone();
        }
        let file_name = format!("{SCANNER_BINARY}{}", std::env::consts::EXE_SUFFIX);
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
            .unwrap_or_else(|| PathBuf::from(file_name))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub log_file: PathBuf,
    pub log_level: String,
    /// Bytes hashed between two `hashing-progress` events.
    pub progress_step: u64,
    /// Read buffer for hashing, in bytes.
    pub read_buffer: usize,
    /// When set, replay this CSV manifest instead of walking the disk.
    pub manifest: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("arcsleuth-fs.log"),
            log_level: "info".to_owned(),
            progress_step: 1_000_000,
            read_buffer: 256 * 1024,
            manifest: None,
        }
    }
}

impl Config {
    /// Load from `ARCSLEUTH_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply environment-style overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(SCANNER_ENV) {
            self.engine.scanner_executable = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.engine.log_level = level.clone();
            self.scanner.log_level = level;
        }
        if let Some(path) = lookup(MANIFEST_ENV) {
            self.scanner.manifest = Some(PathBuf::from(path));
        }
    }
}
