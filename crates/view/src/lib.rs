//! View pipeline: loads filters, helpers and templates from disk into a
//! templating engine, keeps them fresh while files change, and renders view
//! data attached to HTTP responses.
//!
//! ```ignore
//! let layer = grime_view::middleware(ViewOptions::new().view_dir("./view"))?;
//! let app = Router::new().route("/", get(home)).layer(layer);
//! ```

pub mod category;
pub mod classify;
pub mod engine;
pub mod error;
pub mod loader;
pub mod middleware;
pub mod modules;
pub mod options;
pub mod pipeline;
pub mod settings;

use std::sync::Arc;

use grime_core::DeploymentMode;
use tracing::info;

pub use category::Category;
pub use classify::Classified;
pub use engine::{Engine, EngineError, JinjaEngine};
pub use error::ViewError;
pub use loader::{LoadError, LoadResult, LoadStatus, Loader, Subscription};
pub use middleware::{Locals, RenderFailure, RenderLayer, RenderService};
pub use modules::{Export, ExprModules, Function, ModuleResolver, ModuleTable};
pub use options::{Log, SilentLog, TracingLog, ViewOptions};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use settings::Settings;

/// Create a shareable pipeline. Nothing is loaded until [`Pipeline::load`]
/// or [`Pipeline::watch`] is called.
pub fn create(options: ViewOptions) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(options))
}

/// Build a ready-to-use render layer, choosing one-shot loading or live
/// watching from the `GRIME_ENV` deployment mode.
pub fn middleware(options: ViewOptions) -> error::Result<RenderLayer> {
    middleware_for(options, DeploymentMode::from_env())
}

/// [`middleware`] with an explicit deployment mode: production loads every
/// resource once, anything else watches.
pub fn middleware_for(options: ViewOptions, mode: DeploymentMode) -> error::Result<RenderLayer> {
    let pipeline = create(options);
    if mode.is_production() {
        pipeline.load();
    } else {
        pipeline.watch()?;
    }
    info!(mode = %mode, watching = pipeline.is_watching(), "view middleware ready");
    Ok(pipeline.middleware())
}
