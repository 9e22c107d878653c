//! The pipeline orchestrator: bulk load, watch lifecycle and rendering.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::category::Category;
use crate::classify::Classified;
use crate::engine::{Engine, EngineError, JinjaEngine};
use crate::error::{Result, ViewError};
use crate::loader::{LoadResult, Loader, Subscription};
use crate::middleware::RenderLayer;
use crate::modules::{ExprModules, ModuleResolver};
use crate::options::ViewOptions;
use crate::settings::Settings;

/// One view pipeline: an engine, the loaders that fill it, and at most one
/// watch subscription.
///
/// All methods take `&self`; share a pipeline with `Arc`.
pub struct Pipeline {
    loader: Arc<Loader>,
    subscription: Mutex<Option<Subscription>>,
}

impl Pipeline {
    /// A pipeline over a fresh [`JinjaEngine`] and [`ExprModules`].
    pub fn new(options: ViewOptions) -> Self {
        Self::builder(options).build()
    }

    pub fn builder(options: ViewOptions) -> PipelineBuilder {
        PipelineBuilder {
            options,
            engine: None,
            modules: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        self.loader.settings()
    }

    /// The engine this pipeline registers into and renders with.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        self.loader.engine()
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn classify(&self, path: &Path) -> Classified {
        self.settings().classify(path)
    }

    pub fn load_filter(&self, name: &str) -> bool {
        self.loader.load_filter(name)
    }

    pub fn load_helper(&self, name: &str) -> bool {
        self.loader.load_helper(name)
    }

    pub fn load_template(&self, name: &str) -> bool {
        self.loader.load_template(name)
    }

    /// Load one resource through the fixed category table.
    pub fn load_resource(&self, category: Category, name: &str) -> bool {
        self.loader.load(category, name)
    }

    pub fn load_filters(&self) -> Vec<LoadResult> {
        self.loader.load_filters()
    }

    pub fn load_helpers(&self) -> Vec<LoadResult> {
        self.loader.load_helpers()
    }

    pub fn load_templates(&self) -> Vec<LoadResult> {
        self.loader.load_templates()
    }

    /// Bulk-load every filter, helper and template once. Failures are only
    /// visible through the log and the engine's registrations.
    pub fn load(&self) {
        self.load_report();
    }

    /// Like [`Pipeline::load`], returning every per-resource result.
    pub fn load_report(&self) -> Vec<LoadResult> {
        self.loader.load_everything()
    }

    pub fn is_watching(&self) -> bool {
        self.subscription
            .lock()
            .expect("subscription lock poisoned")
            .is_some()
    }

    /// Start reloading resources as their files are added or changed.
    /// Files already present are loaded before this returns.
    pub fn watch(&self) -> Result<()> {
        let mut subscription = self.subscription.lock().expect("subscription lock poisoned");
        if subscription.is_some() {
            return Err(ViewError::AlreadyWatching);
        }
        *subscription = Some(Subscription::start(Arc::clone(&self.loader))?);
        info!("view pipeline is watching for changes");
        Ok(())
    }

    /// Stop the active subscription.
    pub fn unwatch(&self) -> Result<()> {
        let mut subscription = self.subscription.lock().expect("subscription lock poisoned");
        match subscription.take() {
            Some(active) => {
                drop(active);
                info!("view pipeline stopped watching");
                Ok(())
            }
            None => Err(ViewError::NotWatching),
        }
    }

    /// Render a registered template. Engine errors come back unchanged.
    pub fn render(
        &self,
        name: &str,
        context: &serde_json::Value,
    ) -> std::result::Result<String, EngineError> {
        self.engine().render(name, context)
    }

    /// An HTTP layer rendering view data attached to responses with this
    /// pipeline.
    pub fn middleware(self: &Arc<Self>) -> RenderLayer {
        RenderLayer::new(Arc::clone(self))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", self.settings())
            .field("watching", &self.is_watching())
            .finish()
    }
}

/// Builds a [`Pipeline`] with a caller-supplied engine or module resolver.
pub struct PipelineBuilder {
    options: ViewOptions,
    engine: Option<Arc<dyn Engine>>,
    modules: Option<Arc<dyn ModuleResolver>>,
}

impl PipelineBuilder {
    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn modules(mut self, modules: Arc<dyn ModuleResolver>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn build(self) -> Pipeline {
        let settings = Settings::new(self.options);
        let engine: Arc<dyn Engine> = match self.engine {
            Some(engine) => engine,
            None if settings.use_builtin_helpers() => Arc::new(JinjaEngine::with_builtin_helpers()),
            None => Arc::new(JinjaEngine::new()),
        };
        let modules: Arc<dyn ModuleResolver> = match self.modules {
            Some(modules) => modules,
            None => Arc::new(ExprModules::new(settings.module_extension())),
        };

        Pipeline {
            loader: Arc::new(Loader::new(Arc::new(settings), engine, modules)),
            subscription: Mutex::new(None),
        }
    }
}
