//! Configuration loading and config file resolution
//!
//! Values are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 are handled by the binary's argument parser; this module
//! owns the TOML model, file discovery and the compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "COASTCAM_CONFIG";

/// What to do when one camera has two time-exposure frames with the same timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the frame listed last (historical behavior)
    #[default]
    LastWins,
    /// Fail alignment for the day-unit
    Reject,
}

/// Encoding for merged rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Jpg,
    Png,
}

impl OutputFormat {
    /// File extension used in merge keys
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// Where camera calibration comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSourceKind {
    /// YAML files in a local directory
    #[default]
    Yaml,
    /// YAML files under `cameras/parameters/{station}/` in the object store
    StoreYaml,
    /// SQLite calibration database
    Database,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Calibration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub source: CalibrationSourceKind,
    pub yaml_dir: PathBuf,
    pub database_path: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            source: CalibrationSourceKind::Yaml,
            yaml_dir: PathBuf::from("parameters"),
            database_path: PathBuf::from("coastcamdb.sqlite"),
        }
    }
}

/// World grid the rectifier resamples onto (local coordinates, meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGrid {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub dx: f64,
    pub dy: f64,
    pub z: f64,
}

impl Default for TargetGrid {
    fn default() -> Self {
        Self {
            xmin: 0.0,
            xmax: 500.0,
            ymin: 0.0,
            ymax: 700.0,
            dx: 1.0,
            dy: 1.0,
            z: 0.0,
        }
    }
}

impl TargetGrid {
    pub fn validate(&self) -> Result<()> {
        if self.xmax <= self.xmin || self.ymax <= self.ymin {
            return Err(Error::Config(format!(
                "Target grid extent is empty: x [{}, {}], y [{}, {}]",
                self.xmin, self.xmax, self.ymin, self.ymax
            )));
        }
        if self.dx <= 0.0 || self.dy <= 0.0 {
            return Err(Error::Config(format!(
                "Target grid spacing must be positive (dx={}, dy={})",
                self.dx, self.dy
            )));
        }
        Ok(())
    }
}

/// External rectifier section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierConfig {
    /// Program invoked as `{program} {args...} job.json output.png`
    pub program: String,
    /// Leading arguments placed before the job and output paths
    pub args: Vec<String>,
    /// Parent of per-job staging directories; `None` uses the system temp dir
    pub work_dir: Option<PathBuf>,
    pub grid: TargetGrid,
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            program: "coastcam-rectify".to_string(),
            args: Vec::new(),
            work_dir: None,
            grid: TargetGrid::default(),
        }
    }
}

/// Storage retry section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
        }
    }
}

/// TOML configuration file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Local directory holding (or mirroring) the bucket
    pub store_root: Option<PathBuf>,
    /// Local copies of merged rasters; `None` disables them
    pub scratch_dir: Option<PathBuf>,
    /// Bounded worker count for year/station scopes
    pub workers: Option<usize>,
    pub duplicate_policy: DuplicatePolicy,
    pub output_format: OutputFormat,
    pub logging: LoggingConfig,
    pub calibration: CalibrationConfig,
    pub rectifier: RectifierConfig,
    pub retry: RetryConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            store_root: None,
            scratch_dir: Some(PathBuf::from("rectified images")),
            workers: None,
            duplicate_policy: DuplicatePolicy::default(),
            output_format: OutputFormat::default(),
            logging: LoggingConfig::default(),
            calibration: CalibrationConfig::default(),
            rectifier: RectifierConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.rectifier.grid.validate()?;
        if config.workers == Some(0) {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Locate and load the config file, falling back to defaults when none exists
    ///
    /// Returns the config with the path it was read from, `None` for compiled
    /// defaults; callers log it once tracing is up. A missing file is not an
    /// error, an unreadable or invalid one is.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match locate_config_file(explicit)? {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Worker count after applying the compiled default (CPU count)
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }
}

/// Default worker count: available parallelism, at least 1
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Find the config file to use
///
/// An explicit path (argument or `COASTCAM_CONFIG`) must exist. Otherwise
/// `~/.config/coastcam/config.toml`, then `/etc/coastcam/config.toml`.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let user_config = dirs::config_dir().map(|d| d.join("coastcam").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/coastcam/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    Ok(None)
}
