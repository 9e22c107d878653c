//! Resource loading with optional hot-reload via `notify` watcher.
//!
//! Each category root is walked for matching files; every file becomes a
//! logical name that is loaded into the engine independently. A failing
//! resource is logged and skipped, never aborting the batch. While watching,
//! added and changed files are routed back through the same loaders.

mod core;
mod error;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::core::Loader;
pub use self::error::{LoadError, LoadResult, LoadStatus};
pub use self::watcher::Subscription;
