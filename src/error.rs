//! Error types for the page builder

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A recoverable problem found while resolving or assembling a page.
///
/// Warnings never abort a build: the affected item is left out of the output
/// and processing continues. `line` is 1-based for directive problems and `0`
/// for problems found while assembling or linking files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

impl Warning {
    pub fn new(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Warning that is not tied to a source line
    pub fn for_file(file: &Path, message: impl Into<String>) -> Self {
        Self::new(file, 0, message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} warning: {}", self.file.display(), self.line, self.message)
    }
}

/// Receives every warning produced during a build
pub type WarningSink = Box<dyn FnMut(Warning)>;

/// Default sink: forward warnings to the `log` facade
pub fn log_warning(warning: Warning) {
    log::warn!("{}", warning);
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Server error: {message}")]
    Server { message: String },

    #[error("Watch error: {message}")]
    Watch { message: String },
}

pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn watch(message: impl Into<String>) -> Self {
        Self::Watch {
            message: message.into(),
        }
    }
}
