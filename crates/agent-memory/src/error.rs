//! Error types for the agent memory subsystem.

use std::path::PathBuf;

/// Errors produced by memory, registry, and codec operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("action tag {tag} already bound to {existing}, refusing to rebind to {attempted}")]
    DuplicateTag {
        tag: String,
        existing: String,
        attempted: String,
    },

    #[error("unknown action tag: {tag}")]
    UnknownTag { tag: String },

    #[error("invalid action tag: {0}")]
    InvalidTag(String),

    #[error("snapshot references unregistered action: {tag}")]
    UnresolvedAction { tag: String },

    #[error("message not found: role={role} content={preview:?}")]
    NotFound { role: String, preview: String },

    #[error("snapshot io error at {}: {source}", .path.display())]
    CodecIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("causation index out of sync with log: {0}")]
    InconsistentIndex(String),

    #[error("config error: {0}")]
    Config(String),
}

impl MemoryError {
    pub(crate) fn codec_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CodecIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller can reasonably continue after this error.
    ///
    /// Only a failed deletion is recoverable; registry conflicts, resolution
    /// failures, and storage failures all abort the operation that hit them.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
