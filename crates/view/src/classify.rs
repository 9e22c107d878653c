//! Path classification: which category a file belongs to and the logical
//! name it registers under.

use std::path::{Component, Path};

use crate::category::Category;
use crate::settings::Settings;

/// Roots are tested in this order; the first prefix match wins.
const PRECEDENCE: [Category; 3] = [Category::Template, Category::Helper, Category::Filter];

/// Outcome of classifying a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub category: Category,
    /// Root-relative path without extension, `/`-separated.
    pub name: String,
}

impl Settings {
    /// Classify a path against the template, helper and filter roots.
    ///
    /// A path under no root is treated as a template, with its name derived
    /// relative to the template root (and so starting with `..`).
    pub fn classify(&self, path: &Path) -> Classified {
        self.classify_strict(path).unwrap_or_else(|| Classified {
            category: Category::Template,
            name: logical_name(self.root(Category::Template), path),
        })
    }

    /// Like [`Settings::classify`], but `None` when no root contains `path`.
    pub fn classify_strict(&self, path: &Path) -> Option<Classified> {
        PRECEDENCE
            .into_iter()
            .find(|category| path.starts_with(self.root(*category)))
            .map(|category| Classified {
                category,
                name: logical_name(self.root(category), path),
            })
    }
}

/// Logical name of `path` relative to `root`: last extension removed,
/// directories kept as `/`-separated namespace segments.
pub fn logical_name(root: &Path, path: &Path) -> String {
    let stripped = path.with_extension("");
    relative_segments(root, &stripped).join("/")
}

/// Segments leading from `root` to `path`, climbing with `..` where the two
/// diverge.
fn relative_segments(root: &Path, path: &Path) -> Vec<String> {
    let root: Vec<Component<'_>> = root.components().collect();
    let path: Vec<Component<'_>> = path.components().collect();
    let common = root
        .iter()
        .zip(path.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = root[common..]
        .iter()
        .filter(|c| matches!(c, Component::Normal(_)))
        .map(|_| "..".to_string())
        .collect();
    segments.extend(
        path[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    segments
}
