//! RPT-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Top-level error type for the report tree engine.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("[RPT-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[RPT-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[RPT-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[RPT-2001] malformed report payload: {details}")]
    MalformedReport { details: String },

    #[error("[RPT-2002] malformed comparison payload at {location}: {details}")]
    MalformedComparison { location: String, details: String },

    #[error("[RPT-2003] unsupported report version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("[RPT-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[RPT-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "RPT-1001",
            Self::MissingConfig { .. } => "RPT-1002",
            Self::ConfigParse { .. } => "RPT-1003",
            Self::MalformedReport { .. } => "RPT-2001",
            Self::MalformedComparison { .. } => "RPT-2002",
            Self::UnsupportedVersion { .. } => "RPT-2003",
            Self::Serialization { .. } => "RPT-2101",
            Self::Io { .. } => "RPT-3002",
        }
    }

    /// Whether the failure comes from the payload itself rather than the
    /// environment. Payload errors never succeed on retry with the same input.
    #[must_use]
    pub const fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedReport { .. }
                | Self::MalformedComparison { .. }
                | Self::UnsupportedVersion { .. }
                | Self::Serialization { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for report shape violations.
    #[must_use]
    pub fn malformed(details: impl Into<String>) -> Self {
        Self::MalformedReport {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
