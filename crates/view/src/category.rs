//! Resource categories: the three kinds of file a pipeline registers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A kind of view resource, each with its own root directory and loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Filter,
    Helper,
    Template,
}

impl Category {
    /// Bulk-load order: filters, then helpers, then templates.
    pub const ALL: [Category; 3] = [Category::Filter, Category::Helper, Category::Template];

    /// Capitalized label used in load messages (`Filter "x" does not exist`).
    pub fn label(self) -> &'static str {
        match self {
            Self::Filter => "Filter",
            Self::Helper => "Helper",
            Self::Template => "Template",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter => f.write_str("filter"),
            Self::Helper => f.write_str("helper"),
            Self::Template => f.write_str("template"),
        }
    }
}
