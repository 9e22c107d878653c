//! Load failures and per-resource load results.

use std::path::PathBuf;

use crate::category::Category;

/// Why a single resource could not be registered. Never propagated out of a
/// batch load; reported through the log and [`LoadStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// No module resolved, or the template file could not be read.
    #[error("{} \"{name}\" does not exist", .category.label())]
    NotFound { category: Category, name: String },

    /// The module resolved but exports something that is not a function.
    #[error("{} \"{name}\" does not export a function", .category.label())]
    InvalidExport { category: Category, name: String },

    /// The engine rejected the template source.
    #[error("{} \"{name}\" does not compile: {message}", .category.label())]
    Compile {
        category: Category,
        name: String,
        message: String,
    },
}

/// Outcome of loading one discovered file.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub category: Category,
    /// Logical name the resource was loaded under.
    pub name: String,
    /// File the name was derived from.
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    Failed { error: LoadError },
}

impl LoadStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}
