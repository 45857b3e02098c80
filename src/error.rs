use std::path::PathBuf;
use std::process::ExitStatus;

/// Errors that can abort a validation run.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid junction coordinate '{input}': {reason}")]
    CoordinateFormat { input: String, reason: String },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailure {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        source: std::io::Error,
    },

    #[error("required input not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("expected output was not produced (or is empty): {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {source} ({})", path.display())]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("alignment file error: {0}")]
    Alignment(#[from] rust_htslib::errors::Error),

    #[error("stage manifest error: {0}")]
    Manifest(String),
}

impl ValidationError {
    /// Wraps an `io::Error` with the path it concerns.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub fn coordinate(input: &str, reason: impl Into<String>) -> Self {
        Self::CoordinateFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;
