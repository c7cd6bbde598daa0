//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::comparison::SortMode;
use crate::core::errors::{ReportError, Result};
use crate::logger::jsonl::JsonlConfig;

/// Full engine configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub selection: SelectionConfig,
    pub comparison: ComparisonConfig,
    pub merge: MergeConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Navigation behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Expand singleton chains after a load or a click.
    pub auto_descend: bool,
    /// Upper bound on nodes appended by a single auto-descend.
    pub max_auto_descend: usize,
}

/// Comparison grid defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Sort mode applied when a comparison is first rendered.
    pub default_sort: SortMode,
}

/// Split-report merge behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MergeConfig {
    /// Record a diagnostic for structure cases that have no assertion payload.
    pub report_missing_payloads: bool,
}

/// JSONL activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

/// Filesystem paths used by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            auto_descend: true,
            max_auto_descend: 64,
        }
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            default_sort: SortMode::ByStatus,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            report_missing_payloads: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data = home_dir().join(".local").join("share").join("report-tree");
        Self {
            enabled: true,
            jsonl_path: data.join("activity.jsonl"),
            fallback_path: Some(std::env::temp_dir().join("report-tree.jsonl")),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: home_dir()
                .join(".config")
                .join("report-tree")
                .join("config.toml"),
        }
    }
}

impl LoggingConfig {
    /// Writer settings, or `None` when logging is switched off.
    #[must_use]
    pub fn jsonl_config(&self) -> Option<JsonlConfig> {
        self.enabled.then(|| JsonlConfig {
            path: self.jsonl_path.clone(),
            fallback_path: self.fallback_path.clone(),
            max_size_bytes: self.max_size_bytes,
            max_rotated_files: self.max_rotated_files,
            fsync_interval_secs: self.fsync_interval_secs,
        })
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| ReportError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(ReportError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // selection
        if let Some(raw) = lookup("RPT_SELECTION_AUTO_DESCEND") {
            self.selection.auto_descend = parse_env_bool("RPT_SELECTION_AUTO_DESCEND", &raw)?;
        }
        if let Some(raw) = lookup("RPT_SELECTION_MAX_AUTO_DESCEND") {
            self.selection.max_auto_descend =
                parse_env_usize("RPT_SELECTION_MAX_AUTO_DESCEND", &raw)?;
        }

        // comparison
        if let Some(raw) = lookup("RPT_COMPARISON_DEFAULT_SORT") {
            self.comparison.default_sort =
                raw.parse::<SortMode>()
                    .map_err(|details| ReportError::ConfigParse {
                        context: "env",
                        details: format!("RPT_COMPARISON_DEFAULT_SORT={raw:?}: {details}"),
                    })?;
        }

        // merge
        if let Some(raw) = lookup("RPT_MERGE_REPORT_MISSING_PAYLOADS") {
            self.merge.report_missing_payloads =
                parse_env_bool("RPT_MERGE_REPORT_MISSING_PAYLOADS", &raw)?;
        }

        // logging
        if let Some(raw) = lookup("RPT_LOGGING_ENABLED") {
            self.logging.enabled = parse_env_bool("RPT_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("RPT_LOGGING_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("RPT_LOGGING_FALLBACK_PATH") {
            self.logging.fallback_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("RPT_LOGGING_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env_u64("RPT_LOGGING_MAX_SIZE_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("RPT_LOGGING_MAX_ROTATED_FILES") {
            let value = parse_env_u64("RPT_LOGGING_MAX_ROTATED_FILES", &raw)?;
            self.logging.max_rotated_files =
                u32::try_from(value).map_err(|error| ReportError::ConfigParse {
                    context: "env",
                    details: format!("RPT_LOGGING_MAX_ROTATED_FILES={raw:?}: {error}"),
                })?;
        }
        if let Some(raw) = lookup("RPT_LOGGING_FSYNC_INTERVAL_SECS") {
            self.logging.fsync_interval_secs =
                parse_env_u64("RPT_LOGGING_FSYNC_INTERVAL_SECS", &raw)?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.selection.max_auto_descend == 0 {
            return Err(ReportError::InvalidConfig {
                details: "selection.max_auto_descend must be >= 1".to_string(),
            });
        }

        if self.logging.enabled {
            if self.logging.max_size_bytes < 1024 {
                return Err(ReportError::InvalidConfig {
                    details: format!(
                        "logging.max_size_bytes ({}) must be >= 1024",
                        self.logging.max_size_bytes
                    ),
                });
            }
            if self.logging.max_rotated_files == 0 {
                return Err(ReportError::InvalidConfig {
                    details: "logging.max_rotated_files must be >= 1".to_string(),
                });
            }
            if self.logging.jsonl_path.as_os_str().is_empty() {
                return Err(ReportError::InvalidConfig {
                    details: "logging.jsonl_path must not be empty when logging is enabled"
                        .to_string(),
                });
            }
            if self.logging.fallback_path.as_deref() == Some(self.logging.jsonl_path.as_path()) {
                return Err(ReportError::InvalidConfig {
                    details: "logging.fallback_path must differ from logging.jsonl_path"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[RPT-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| ReportError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.parse::<usize>().map_err(|error| ReportError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| ReportError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
