//! Errors surfaced to callers of the pipeline.

use crate::engine::EngineError;

/// Errors from watch lifecycle misuse, the watch primitive, or rendering.
///
/// Resource load failures never appear here; see [`crate::LoadError`].
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("Files are already being watched")]
    AlreadyWatching,

    #[error("No files are being watched")]
    NotWatching,

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Render(#[from] EngineError),

    #[error("View data has no \"{0}\" property naming a template")]
    MissingTemplateName(String),
}

impl ViewError {
    /// Whether this is a watch/unwatch call made in the wrong state.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::AlreadyWatching | Self::NotWatching)
    }
}

pub type Result<T> = std::result::Result<T, ViewError>;
