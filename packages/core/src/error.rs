use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StretchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No video track found in {0}")]
    TrackMissing(String),

    #[error("Composition error: {0}")]
    Composition(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type StretchResult<T> = Result<T, StretchError>;

/// Coarse error grouping used in batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Decode,
    TrackMissing,
    Composition,
    Render,
    Export,
    Persist,
    PermissionDenied,
    Configuration,
    Cancelled,
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorCategory::Decode => "unreadable source",
            ErrorCategory::TrackMissing => "no video track",
            ErrorCategory::Composition => "composition failed",
            ErrorCategory::Render => "render failed",
            ErrorCategory::Export => "export failed",
            ErrorCategory::Persist => "save failed",
            ErrorCategory::PermissionDenied => "permission denied",
            ErrorCategory::Configuration => "invalid configuration",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Io => "I/O failure",
        };
        write!(f, "{}", label)
    }
}

impl StretchError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StretchError::Io(_) => ErrorCategory::Io,
            StretchError::Serialization(_) => ErrorCategory::Configuration,
            StretchError::Decode(_) => ErrorCategory::Decode,
            StretchError::TrackMissing(_) => ErrorCategory::TrackMissing,
            StretchError::Composition(_) => ErrorCategory::Composition,
            StretchError::Render(_) => ErrorCategory::Render,
            StretchError::Export(_) => ErrorCategory::Export,
            StretchError::Persist(_) => ErrorCategory::Persist,
            StretchError::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            StretchError::Configuration(_) => ErrorCategory::Configuration,
            StretchError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error stops the whole batch rather than a single item
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            StretchError::PermissionDenied(_)
                | StretchError::Configuration(_)
                | StretchError::Cancelled
        )
    }
}
