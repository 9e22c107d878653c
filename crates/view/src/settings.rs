//! Normalized, immutable pipeline configuration.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::category::Category;
use crate::options::{Log, ViewOptions};

/// Configuration computed once from [`ViewOptions`] when a pipeline is
/// created. Roots are absolute so event paths can be prefix-matched.
#[derive(Clone)]
pub struct Settings {
    filters_root: PathBuf,
    helpers_root: PathBuf,
    templates_root: PathBuf,
    template_extension: String,
    module_extension: String,
    source_property: String,
    template_property: String,
    use_builtin_helpers: bool,
    strict_paths: bool,
    log: Arc<dyn Log>,
}

impl Settings {
    pub fn new(options: ViewOptions) -> Self {
        Self {
            filters_root: resolve_root(&options.filters_path),
            helpers_root: resolve_root(&options.helpers_path),
            templates_root: resolve_root(&options.templates_path),
            template_extension: trim_dot(options.template_extension),
            module_extension: trim_dot(options.module_extension),
            source_property: options.source_property,
            template_property: options.template_property,
            use_builtin_helpers: options.use_builtin_helpers,
            strict_paths: options.strict_paths,
            log: options.log,
        }
    }

    /// Absolute root directory of a category.
    pub fn root(&self, category: Category) -> &Path {
        match category {
            Category::Filter => &self.filters_root,
            Category::Helper => &self.helpers_root,
            Category::Template => &self.templates_root,
        }
    }

    /// File extension (without the dot) of a category's files.
    pub fn extension(&self, category: Category) -> &str {
        match category {
            Category::Filter | Category::Helper => &self.module_extension,
            Category::Template => &self.template_extension,
        }
    }

    /// Glob matching every file of a category: `<root>/**/*.<ext>`.
    pub fn pattern(&self, category: Category) -> String {
        let root = self.root(category).to_string_lossy();
        let root = root.trim_end_matches(['/', '\\']);
        format!("{}/**/*.{}", glob::Pattern::escape(root), self.extension(category))
    }

    /// Backing file of a template: `<root>/<name>.<ext>`.
    pub fn template_path(&self, name: &str) -> PathBuf {
        let mut path = self.templates_root.join(name).into_os_string();
        path.push(".");
        path.push(&self.template_extension);
        PathBuf::from(path)
    }

    /// Extension-less module path of a filter or helper: `<root>/<name>`.
    pub fn module_path(&self, category: Category, name: &str) -> PathBuf {
        self.root(category).join(name)
    }

    pub fn template_extension(&self) -> &str {
        &self.template_extension
    }

    pub fn module_extension(&self) -> &str {
        &self.module_extension
    }

    pub fn source_property(&self) -> &str {
        &self.source_property
    }

    pub fn template_property(&self) -> &str {
        &self.template_property
    }

    pub fn use_builtin_helpers(&self) -> bool {
        self.use_builtin_helpers
    }

    pub fn strict_paths(&self) -> bool {
        self.strict_paths
    }

    pub fn log(&self) -> &dyn Log {
        self.log.as_ref()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("filters_root", &self.filters_root)
            .field("helpers_root", &self.helpers_root)
            .field("templates_root", &self.templates_root)
            .field("template_extension", &self.template_extension)
            .field("module_extension", &self.module_extension)
            .field("source_property", &self.source_property)
            .field("template_property", &self.template_property)
            .field("use_builtin_helpers", &self.use_builtin_helpers)
            .field("strict_paths", &self.strict_paths)
            .finish_non_exhaustive()
    }
}

/// Canonicalize a root that exists so it matches the paths the platform
/// watcher reports. A missing root is made absolute against the current
/// directory with `.` segments dropped.
fn resolve_root(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn trim_dot(extension: String) -> String {
    match extension.strip_prefix('.') {
        Some(rest) => rest.to_string(),
        None => extension,
    }
}
