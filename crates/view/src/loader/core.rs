//! Core [`Loader`]: registers filters, helpers and templates with an engine.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use glob::MatchOptions;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::classify::logical_name;
use crate::engine::Engine;
use crate::modules::ModuleResolver;
use crate::settings::Settings;

use super::error::{LoadError, LoadResult, LoadStatus};

/// Dotfiles are never discovered, matching shell globbing.
pub(crate) const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: true,
};

/// Loads view resources from disk into an [`Engine`].
///
/// Every load is independent: a failure is written to the configured log,
/// reported in the returned status, and leaves the engine untouched. Loaders
/// are safe to call from the watcher thread while requests are rendering.
pub struct Loader {
    settings: Arc<Settings>,
    engine: Arc<dyn Engine>,
    modules: Arc<dyn ModuleResolver>,
}

impl Loader {
    pub fn new(
        settings: Arc<Settings>,
        engine: Arc<dyn Engine>,
        modules: Arc<dyn ModuleResolver>,
    ) -> Self {
        Self {
            settings,
            engine,
            modules,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Resolve the filter module `name` and register its function.
    pub fn load_filter(&self, name: &str) -> bool {
        self.load(Category::Filter, name)
    }

    /// Resolve the helper module `name` and register its function.
    pub fn load_helper(&self, name: &str) -> bool {
        self.load(Category::Helper, name)
    }

    /// Read `<templates_root>/<name>.<ext>`, compile it and register it.
    pub fn load_template(&self, name: &str) -> bool {
        self.load(Category::Template, name)
    }

    /// Load one resource of any category. `true` when it was registered.
    pub fn load(&self, category: Category, name: &str) -> bool {
        self.load_status(category, name).is_loaded()
    }

    /// Load one resource and report how it went.
    pub fn load_status(&self, category: Category, name: &str) -> LoadStatus {
        let outcome = match category {
            Category::Filter | Category::Helper => self.register_module(category, name),
            Category::Template => self.register_template(name),
        };

        match outcome {
            Ok(()) => {
                info!(category = %category, name = %name, "registered view resource");
                self.settings
                    .log()
                    .info(&format!("{} loaded: \"{}\"", category.label(), name));
                LoadStatus::Loaded
            }
            Err(error) => {
                warn!(category = %category, name = %name, error = %error, "view resource not registered");
                self.settings.log().error(&error.to_string());
                LoadStatus::Failed { error }
            }
        }
    }

    fn register_module(&self, category: Category, name: &str) -> Result<(), LoadError> {
        let path = self.settings.module_path(category, name);
        let export = self
            .modules
            .try_load(&path)
            .ok_or_else(|| LoadError::NotFound {
                category,
                name: name.to_string(),
            })?;
        let function = export
            .into_function()
            .ok_or_else(|| LoadError::InvalidExport {
                category,
                name: name.to_string(),
            })?;

        match category {
            Category::Helper => self.engine.set_helper(name, function),
            _ => self.engine.set_filter(name, function),
        }
        Ok(())
    }

    fn register_template(&self, name: &str) -> Result<(), LoadError> {
        let path = self.settings.template_path(name);
        let source = fs::read_to_string(&path).map_err(|e| {
            debug!(path = %path.display(), error = %e, "template not readable");
            LoadError::NotFound {
                category: Category::Template,
                name: name.to_string(),
            }
        })?;

        self.engine
            .add_template(name, &source)
            .map_err(|e| LoadError::Compile {
                category: Category::Template,
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    /// Every file under a category root matching `**/*.<ext>`, dotfiles
    /// excluded. A missing root yields nothing.
    pub fn discover(&self, category: Category) -> Vec<PathBuf> {
        glob_files(&self.settings.pattern(category))
    }

    /// Load every discovered file of a category under its logical name.
    pub fn load_all(&self, category: Category) -> Vec<LoadResult> {
        let root = self.settings.root(category);
        self.discover(category)
            .into_iter()
            .map(|path| {
                let name = logical_name(root, &path);
                let status = self.load_status(category, &name);
                LoadResult {
                    category,
                    name,
                    path,
                    status,
                }
            })
            .collect()
    }

    pub fn load_filters(&self) -> Vec<LoadResult> {
        self.load_all(Category::Filter)
    }

    pub fn load_helpers(&self) -> Vec<LoadResult> {
        self.load_all(Category::Helper)
    }

    pub fn load_templates(&self) -> Vec<LoadResult> {
        self.load_all(Category::Template)
    }

    /// Load every category in order: filters, helpers, templates.
    pub fn load_everything(&self) -> Vec<LoadResult> {
        let results: Vec<LoadResult> = Category::ALL
            .into_iter()
            .flat_map(|category| self.load_all(category))
            .collect();
        let loaded = results.iter().filter(|r| r.status.is_loaded()).count();
        info!(
            loaded,
            failed = results.len() - loaded,
            "loaded view resources"
        );
        results
    }
}

/// Files matching `pattern`, skipping unreadable entries and directories.
pub(crate) fn glob_files(pattern: &str) -> Vec<PathBuf> {
    let entries = match glob::glob_with(pattern, MATCH_OPTIONS) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "invalid resource pattern");
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "failed to read path while discovering resources");
                None
            }
        })
        .collect()
}
