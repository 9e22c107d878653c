//! Module resolution for filters and helpers.
//!
//! A filter or helper is a *module*: something resolved from an
//! extension-less path under its category root that may export a function.
//! Resolution never fails; an unresolvable module is simply `None`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use minijinja::{context, Environment, Error, Value};
use tracing::debug;

/// A callable registered as a filter or helper. Filters receive the filtered
/// value as their first argument.
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync>;

/// Whatever a module exports.
#[derive(Clone)]
pub enum Export {
    Function(Function),
    Value(Value),
}

impl Export {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// The exported function, or `None` when the export is not callable.
    pub fn into_function(self) -> Option<Function> {
        match self {
            Self::Function(f) => Some(f),
            Self::Value(_) => None,
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Export::Function(..)"),
            Self::Value(v) => f.debug_tuple("Export::Value").field(v).finish(),
        }
    }
}

/// Resolves module paths to exports.
pub trait ModuleResolver: Send + Sync {
    /// Resolve the module at `path` (no extension). Returns `None` when the
    /// module is missing or cannot be loaded.
    fn try_load(&self, path: &Path) -> Option<Export>;
}

/// Modules stored as minijinja expression files (`<path>.<extension>`).
///
/// The expression is compiled when the module resolves and evaluated on every
/// call with `value` (the first argument) and `args` (all arguments) in scope,
/// so `value | reverse` is a complete filter module. A blank file exports
/// nothing callable. Files are re-read on every resolution.
#[derive(Debug, Clone)]
pub struct ExprModules {
    extension: String,
}

impl ExprModules {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    fn file_path(&self, path: &Path) -> PathBuf {
        let mut file = path.as_os_str().to_os_string();
        file.push(".");
        file.push(&self.extension);
        PathBuf::from(file)
    }
}

impl ModuleResolver for ExprModules {
    fn try_load(&self, path: &Path) -> Option<Export> {
        let file = self.file_path(path);
        let source = match fs::read_to_string(&file) {
            Ok(source) => source.trim().to_string(),
            Err(e) => {
                debug!(path = %file.display(), error = %e, "module not readable");
                return None;
            }
        };

        if source.is_empty() {
            return Some(Export::Value(Value::UNDEFINED));
        }

        match expression_env().compile_expression_owned(source) {
            Ok(expr) => Some(Export::Function(Arc::new(move |args: &[Value]| {
                expr.eval(context! {
                    value => args.first().cloned().unwrap_or(Value::UNDEFINED),
                    args => args.to_vec(),
                })
            }))),
            Err(e) => {
                debug!(path = %file.display(), error = %e, "module expression does not compile");
                None
            }
        }
    }
}

/// Shared environment expression modules compile against. Expressions are
/// compiled once per resolution and live as long as the registered function.
fn expression_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(Environment::new)
}

/// In-memory modules keyed by extension-less path. Lets a host link native
/// functions into a view tree.
#[derive(Clone, Default)]
pub struct ModuleTable {
    modules: Arc<RwLock<HashMap<PathBuf, Export>>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, export: Export) {
        self.modules
            .write()
            .expect("module table lock poisoned")
            .insert(path.into(), export);
    }

    pub fn remove(&self, path: &Path) -> Option<Export> {
        self.modules
            .write()
            .expect("module table lock poisoned")
            .remove(path)
    }
}

impl ModuleResolver for ModuleTable {
    fn try_load(&self, path: &Path) -> Option<Export> {
        self.modules
            .read()
            .expect("module table lock poisoned")
            .get(path)
            .cloned()
    }
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.modules.read().expect("module table lock poisoned");
        f.debug_struct("ModuleTable")
            .field("modules", &guard.keys().collect::<Vec<_>>())
            .finish()
    }
}
