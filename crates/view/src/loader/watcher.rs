//! Filesystem watching: routes added and changed files back to the loaders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::settings::Settings;

use super::core::{glob_files, Loader, MATCH_OPTIONS};

/// A live subscription to filesystem events under the category roots.
///
/// Dropping it stops delivery.
pub struct Subscription {
    roots: Vec<PathBuf>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: RecommendedWatcher,
}

impl Subscription {
    /// Start watching every existing category root, then dispatch each file
    /// already present so the engine starts out populated.
    pub fn start(loader: Arc<Loader>) -> Result<Self, notify::Error> {
        let patterns = WatchPatterns::new(loader.settings());
        let handler_loader = Arc::clone(&loader);
        let handler_patterns = patterns.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => handle_fs_event(&event, &handler_loader, &handler_patterns),
            Err(e) => warn!(error = %e, "filesystem watcher error"),
        })?;

        let roots = watch_roots(loader.settings());
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!(path = %root.display(), "watching view directory for changes (recursive)");
        }

        for root in &roots {
            dispatch_tree(&loader, &patterns, root);
        }

        Ok(Self {
            roots,
            _watcher: watcher,
        })
    }

    /// Directories actually being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Existing category roots, skipping any nested inside another watched root.
fn watch_roots(settings: &Settings) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for category in Category::ALL {
        let root = settings.root(category);
        if root.is_dir() {
            candidates.push(root.to_path_buf());
        } else {
            warn!(category = %category, path = %root.display(), "view directory does not exist, not watching it");
        }
    }
    candidates.sort();
    candidates.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        if !roots.iter().any(|root| candidate.starts_with(root)) {
            roots.push(candidate);
        }
    }
    roots
}

/// Compiled per-category globs an event path must match to be dispatched.
#[derive(Clone)]
pub(super) struct WatchPatterns {
    patterns: Vec<glob::Pattern>,
}

impl WatchPatterns {
    pub(super) fn new(settings: &Settings) -> Self {
        let patterns = Category::ALL
            .into_iter()
            .filter_map(|category| {
                let pattern = settings.pattern(category);
                glob::Pattern::new(&pattern)
                    .map_err(|e| warn!(pattern = %pattern, error = %e, "invalid watch pattern"))
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    fn matches(&self, path: &Path) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_path_with(path, MATCH_OPTIONS))
    }
}

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(event: &Event, loader: &Loader, patterns: &WatchPatterns) {
    let paths: &[PathBuf] = match &event.kind {
        EventKind::Create(_) => event.paths.as_slice(),
        // The old name of a rename is gone; only its destination is loaded.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.last() {
            Some(to) => std::slice::from_ref(to),
            None => return,
        },
        EventKind::Modify(
            ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any | ModifyKind::Other,
        ) => event.paths.as_slice(),
        _ => return,
    };

    // A directory created or moved into a root may already hold files that
    // were written before the watcher started following it.
    let appeared = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    );

    for path in paths {
        if path.is_dir() {
            if appeared {
                debug!(kind = ?event.kind, path = %path.display(), "view directory appeared");
                dispatch_tree(loader, patterns, path);
            }
        } else if patterns.matches(path) {
            debug!(kind = ?event.kind, path = %path.display(), "view file event");
            dispatch(loader, path);
        }
    }
}

/// Dispatch every resource file below `dir` that falls under a category
/// pattern.
pub(super) fn dispatch_tree(loader: &Loader, patterns: &WatchPatterns, dir: &Path) {
    let settings = loader.settings();
    let mut extensions: Vec<&str> = Category::ALL
        .into_iter()
        .map(|category| settings.extension(category))
        .collect();
    extensions.sort_unstable();
    extensions.dedup();

    let dir = dir.to_string_lossy();
    let dir = glob::Pattern::escape(dir.trim_end_matches(['/', '\\']));
    for extension in extensions {
        for path in glob_files(&format!("{}/**/*.{}", dir, extension)) {
            if patterns.matches(&path) {
                dispatch(loader, &path);
            }
        }
    }
}

/// Classify `path` and load it with the matching loader. `None` when strict
/// classification rejects the path.
pub(super) fn dispatch(loader: &Loader, path: &Path) -> Option<bool> {
    let settings = loader.settings();
    let classified = if settings.strict_paths() {
        match settings.classify_strict(path) {
            Some(classified) => classified,
            None => {
                debug!(path = %path.display(), "ignoring file outside every view root");
                return None;
            }
        }
    } else {
        settings.classify(path)
    };
    Some(loader.load(classified.category, &classified.name))
}
