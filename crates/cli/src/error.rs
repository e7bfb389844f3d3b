//! CLI error types.

use std::fmt;

use error_stack::Report;
use vast_tracking_common::error::VastTrackingError;

#[derive(Debug)]
pub enum CliError {
    /// Settings file error
    Config(String),
    /// Request, response or markup input error
    Input(String),
    /// IO error
    Io(std::io::Error),
    /// JSON encoding error
    Json(String),
    /// TOML parsing error
    Toml(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Input(msg) => write!(f, "Input error: {}", msg),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Json(msg) => write!(f, "JSON error: {}", msg),
            CliError::Toml(msg) => write!(f, "TOML error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Toml(err.to_string())
    }
}

impl From<Report<VastTrackingError>> for CliError {
    fn from(report: Report<VastTrackingError>) -> Self {
        match report.current_context() {
            VastTrackingError::InvalidRequest { .. } => CliError::Input(format!("{report:?}")),
            _ => CliError::Config(format!("{report:?}")),
        }
    }
}
