//! The templating engine seam and its minijinja implementation.
//!
//! The pipeline only ever adds or overwrites registrations; parsing,
//! escaping and rendering are entirely the engine's business.

use std::collections::BTreeSet;
use std::sync::RwLock;

use minijinja::value::Rest;
use minijinja::{Environment, Error, ErrorKind, Value};
use thiserror::Error as ThisError;

use crate::modules::Function;

/// Errors reported by an [`Engine`]. Messages are the engine's own.
#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error(transparent)]
    Jinja(#[from] Error),

    #[error("{0}")]
    Other(String),
}

/// Registration and rendering capabilities the pipeline needs from a
/// templating engine.
pub trait Engine: Send + Sync {
    /// Compile `source` and register it as `name`. A failed compile leaves
    /// the template store unchanged.
    fn add_template(&self, name: &str, source: &str) -> Result<(), EngineError>;

    /// Register or overwrite a filter.
    fn set_filter(&self, name: &str, function: Function);

    /// Register or overwrite a helper (a global function).
    fn set_helper(&self, name: &str, function: Function);

    /// Render a registered template against a JSON context.
    fn render(&self, name: &str, context: &serde_json::Value) -> Result<String, EngineError>;

    fn has_filter(&self, name: &str) -> bool;
    fn has_helper(&self, name: &str) -> bool;
    fn has_template(&self, name: &str) -> bool;
}

struct Registry {
    env: Environment<'static>,
    filters: BTreeSet<String>,
    helpers: BTreeSet<String>,
    templates: BTreeSet<String>,
}

/// [`Engine`] backed by a shared [`minijinja::Environment`].
pub struct JinjaEngine {
    registry: RwLock<Registry>,
}

impl JinjaEngine {
    /// An engine with only minijinja's own builtins.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry {
                env: Environment::new(),
                filters: BTreeSet::new(),
                helpers: BTreeSet::new(),
                templates: BTreeSet::new(),
            }),
        }
    }

    /// An engine that also carries the built-in helper set
    /// (`size`, `math`, `dump`, `env`).
    pub fn with_builtin_helpers() -> Self {
        let engine = Self::new();
        {
            let mut registry = engine.registry.write().expect("engine lock poisoned");
            registry.env.add_function("size", size_helper);
            registry.env.add_function("math", math_helper);
            registry.env.add_function("dump", dump_helper);
            registry.env.add_function("env", env_helper);
            for name in ["size", "math", "dump", "env"] {
                registry.helpers.insert(name.to_string());
            }
        }
        engine
    }

    /// Names of registered filters, sorted.
    pub fn filters(&self) -> Vec<String> {
        let registry = self.registry.read().expect("engine lock poisoned");
        registry.filters.iter().cloned().collect()
    }

    /// Names of registered helpers, sorted.
    pub fn helpers(&self) -> Vec<String> {
        let registry = self.registry.read().expect("engine lock poisoned");
        registry.helpers.iter().cloned().collect()
    }

    /// Names of registered templates, sorted.
    pub fn templates(&self) -> Vec<String> {
        let registry = self.registry.read().expect("engine lock poisoned");
        registry.templates.iter().cloned().collect()
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for JinjaEngine {
    fn add_template(&self, name: &str, source: &str) -> Result<(), EngineError> {
        let mut registry = self.registry.write().expect("engine lock poisoned");
        registry
            .env
            .add_template_owned(name.to_string(), source.to_string())?;
        registry.templates.insert(name.to_string());
        Ok(())
    }

    fn set_filter(&self, name: &str, function: Function) {
        let mut registry = self.registry.write().expect("engine lock poisoned");
        registry
            .env
            .add_filter(name.to_string(), move |args: Rest<Value>| function(&args.0));
        registry.filters.insert(name.to_string());
    }

    fn set_helper(&self, name: &str, function: Function) {
        let mut registry = self.registry.write().expect("engine lock poisoned");
        registry
            .env
            .add_function(name.to_string(), move |args: Rest<Value>| function(&args.0));
        registry.helpers.insert(name.to_string());
    }

    fn render(&self, name: &str, context: &serde_json::Value) -> Result<String, EngineError> {
        let registry = self.registry.read().expect("engine lock poisoned");
        let template = registry.env.get_template(name)?;
        Ok(template.render(context)?)
    }

    fn has_filter(&self, name: &str) -> bool {
        let registry = self.registry.read().expect("engine lock poisoned");
        registry.filters.contains(name)
    }

    fn has_helper(&self, name: &str) -> bool {
        let registry = self.registry.read().expect("engine lock poisoned");
        registry.helpers.contains(name)
    }

    fn has_template(&self, name: &str) -> bool {
        let registry = self.registry.read().expect("engine lock poisoned");
        registry.templates.contains(name)
    }
}

// ── Built-in helpers ──────────────────────────────────────────

/// Length of a string, sequence or map; 0 for anything else.
fn size_helper(value: Value) -> usize {
    value.len().unwrap_or(0)
}

/// Arithmetic on a key: `math(10, "add", 5)`.
fn math_helper(key: f64, method: String, operand: Option<f64>) -> Result<Value, Error> {
    let needs_operand = || {
        operand.ok_or_else(|| {
            Error::new(
                ErrorKind::MissingArgument,
                format!("math method \"{}\" needs an operand", method),
            )
        })
    };
    let result = match method.as_str() {
        "add" => key + needs_operand()?,
        "subtract" => key - needs_operand()?,
        "multiply" => key * needs_operand()?,
        "divide" => key / needs_operand()?,
        "mod" => key % needs_operand()?,
        "abs" => key.abs(),
        "floor" => key.floor(),
        "ceil" => key.ceil(),
        "round" => key.round(),
        other => {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("unknown math method \"{}\"", other),
            ))
        }
    };
    if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        Ok(Value::from(result as i64))
    } else {
        Ok(Value::from(result))
    }
}

/// Pretty-printed JSON of a value.
fn dump_helper(value: Value) -> Result<String, Error> {
    serde_json::to_string_pretty(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

/// Read an environment variable by name; empty when unset.
fn env_helper(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
