//! Construction options and the pluggable load log.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use grime_core::config::ViewsConfig;

pub const DEFAULT_FILTERS_PATH: &str = "./view/filter";
pub const DEFAULT_HELPERS_PATH: &str = "./view/helper";
pub const DEFAULT_TEMPLATES_PATH: &str = "./view/template";
pub const DEFAULT_TEMPLATE_EXTENSION: &str = "dust";
pub const DEFAULT_MODULE_EXTENSION: &str = "expr";
pub const DEFAULT_SOURCE_PROPERTY: &str = "viewData";
pub const DEFAULT_TEMPLATE_PROPERTY: &str = "template";

/// Receives the human-readable outcome of every load attempt.
pub trait Log: Send + Sync {
    fn error(&self, message: &str);
    fn info(&self, message: &str);
}

/// Forwards load messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl Log for TracingLog {
    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentLog;

impl Log for SilentLog {
    fn error(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
}

/// Options accepted by [`crate::create`] and [`crate::middleware`].
///
/// Every field has a default; use the builder methods to override them.
/// The pipeline normalizes these into an immutable [`crate::Settings`] once,
/// at construction.
#[derive(Clone)]
pub struct ViewOptions {
    pub filters_path: PathBuf,
    pub helpers_path: PathBuf,
    pub templates_path: PathBuf,
    /// Extension of template files, without the dot.
    pub template_extension: String,
    /// Extension of filter and helper module files, without the dot.
    pub module_extension: String,
    /// Name of the response property holding the view data.
    pub source_property: String,
    /// Name of the view-data property holding the template name.
    pub template_property: String,
    /// Start the engine with the built-in helper set.
    pub use_builtin_helpers: bool,
    /// Ignore watch events for paths under no configured root instead of
    /// treating them as templates.
    pub strict_paths: bool,
    pub log: Arc<dyn Log>,
}

impl ViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.filters_path = path.into();
        self
    }

    pub fn helpers_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.helpers_path = path.into();
        self
    }

    pub fn templates_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.templates_path = path.into();
        self
    }

    pub fn template_extension(mut self, extension: impl Into<String>) -> Self {
        self.template_extension = extension.into();
        self
    }

    pub fn module_extension(mut self, extension: impl Into<String>) -> Self {
        self.module_extension = extension.into();
        self
    }

    pub fn source_property(mut self, property: impl Into<String>) -> Self {
        self.source_property = property.into();
        self
    }

    pub fn template_property(mut self, property: impl Into<String>) -> Self {
        self.template_property = property.into();
        self
    }

    pub fn use_builtin_helpers(mut self, enabled: bool) -> Self {
        self.use_builtin_helpers = enabled;
        self
    }

    pub fn strict_paths(mut self, enabled: bool) -> Self {
        self.strict_paths = enabled;
        self
    }

    pub fn log(mut self, log: impl Log + 'static) -> Self {
        self.log = Arc::new(log);
        self
    }

    /// Place all three roots under one directory (`<dir>/filter`,
    /// `<dir>/helper`, `<dir>/template`).
    pub fn view_dir(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.filters_path(dir.join("filter"))
            .helpers_path(dir.join("helper"))
            .templates_path(dir.join("template"))
    }
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            filters_path: PathBuf::from(DEFAULT_FILTERS_PATH),
            helpers_path: PathBuf::from(DEFAULT_HELPERS_PATH),
            templates_path: PathBuf::from(DEFAULT_TEMPLATES_PATH),
            template_extension: DEFAULT_TEMPLATE_EXTENSION.to_string(),
            module_extension: DEFAULT_MODULE_EXTENSION.to_string(),
            source_property: DEFAULT_SOURCE_PROPERTY.to_string(),
            template_property: DEFAULT_TEMPLATE_PROPERTY.to_string(),
            use_builtin_helpers: true,
            strict_paths: false,
            log: Arc::new(TracingLog),
        }
    }
}

impl From<&ViewsConfig> for ViewOptions {
    fn from(config: &ViewsConfig) -> Self {
        Self::default()
            .filters_path(&config.filters_path)
            .helpers_path(&config.helpers_path)
            .templates_path(&config.templates_path)
            .template_extension(&config.template_extension)
            .source_property(&config.source_property)
            .template_property(&config.template_property)
            .use_builtin_helpers(config.use_builtin_helpers)
    }
}

impl fmt::Debug for ViewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewOptions")
            .field("filters_path", &self.filters_path)
            .field("helpers_path", &self.helpers_path)
            .field("templates_path", &self.templates_path)
            .field("template_extension", &self.template_extension)
            .field("module_extension", &self.module_extension)
            .field("source_property", &self.source_property)
            .field("template_property", &self.template_property)
            .field("use_builtin_helpers", &self.use_builtin_helpers)
            .field("strict_paths", &self.strict_paths)
            .finish_non_exhaustive()
    }
}
