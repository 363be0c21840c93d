//! Error types for synchronization

use crate::backend::BackendError;
use bindery_editor::EditorError;
use thiserror::Error;

/// Failure classes of load/store flows
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("The data is corrupted.")]
    DataCorrupted(String),

    #[error("The data could not be found")]
    NotFound,

    #[error("{message}")]
    Transport {
        status: Option<u16>,
        status_text: Option<String>,
        message: String,
    },

    #[error("{0} is already in progress")]
    InProgress(&'static str),

    #[error(transparent)]
    Editor(#[from] EditorError),
}

impl SyncError {
    /// Classify a backend rejection
    pub fn from_backend(error: BackendError, context: &str) -> Self {
        if error.is_not_found() {
            return SyncError::NotFound;
        }
        Self::transport(error, context)
    }

    /// Visible failure message, with HTTP status and reason when known
    pub fn transport(error: BackendError, context: &str) -> Self {
        let mut message = context.to_string();
        if let (Some(status), Some(status_text)) = (error.status, error.status_text.as_deref()) {
            message.push_str(&format!(" (HTTP {}: {})", status, status_text));
        }

        SyncError::Transport {
            status: error.status,
            status_text: error.status_text,
            message,
        }
    }
}

/// How a load concluded
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Data was rendered
    Loaded,
    /// Nothing stored yet: empty render, no notice
    Empty,
    /// Unparseable response: empty render plus a notice
    Corrupted,
    /// Any other failure: the tree is left untouched, a notice is shown
    Failed(SyncError),
}

/// Config file problems
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
