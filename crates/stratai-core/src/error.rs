use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Core error type for StratAI.
#[derive(Debug, Error)]
pub enum StratAiError {
    /// Search tools or credentials were not initialised; raised before any task runs.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Any failure while the crew executes its tasks.
    #[error("research failed: {0}")]
    Orchestration(String),
    /// Failure while laying out or serialising the PDF report.
    #[error("error generating PDF: {0}")]
    Render(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StratAiError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    pub fn orchestration(reason: impl Into<String>) -> Self {
        Self::Orchestration(reason.into())
    }
}

/// Error raised by an agent tool. It is reported back to the model as an
/// observation rather than aborting the run.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub tool: String,
    pub reason: String,
}

impl ToolError {
    pub fn new(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tool `{}` failed: {}", self.tool, self.reason)
    }
}

impl std::error::Error for ToolError {}
