use std::env;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Env var holding the deployment mode (`production` or anything else).
pub const MODE_ENV_KEY: &str = "GRIME_ENV";

/// Env var selecting the active profile.
pub const PROFILE_ENV_KEY: &str = "GRIME_PROFILE";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    profiled_env_opt(profile, key)
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Parse the usual spellings of a boolean flag.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ── Deployment mode ───────────────────────────────────────────

/// Whether views are bulk-loaded once or watched for live reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Production,
    Development,
}

impl DeploymentMode {
    /// Read the mode from `GRIME_ENV`. Only `production` selects production.
    pub fn from_env() -> Self {
        Self::parse(&env_or(MODE_ENV_KEY, ""))
    }

    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub mode: DeploymentMode,
    pub server: ServerConfig,
    pub views: ViewsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `GRIME_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or(PROFILE_ENV_KEY, "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            mode: DeploymentMode::parse(&profiled_env_or(p, MODE_ENV_KEY, "")),
            server: ServerConfig::from_env_profiled(p),
            views: ViewsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}, mode: {}):", self.profile_label(), self.mode);
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!("  filters:     {}", self.views.filters_path.display());
        tracing::info!("  helpers:     {}", self.views.helpers_path.display());
        tracing::info!(
            "  templates:   {} (*.{})",
            self.views.templates_path.display(),
            self.views.template_extension
        );
        tracing::info!(
            "  view data:   source={}, template={}, builtin_helpers={}",
            self.views.source_property,
            self.views.template_property,
            self.views.use_builtin_helpers
        );
    }

    /// Return a JSON view of the config for diagnostics.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "mode": self.mode,
            "server": { "host": self.server.host, "port": self.server.port },
            "views": self.views,
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3000),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Views ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsConfig {
    pub filters_path: PathBuf,
    pub helpers_path: PathBuf,
    pub templates_path: PathBuf,
    pub template_extension: String,
    pub source_property: String,
    pub template_property: String,
    pub use_builtin_helpers: bool,
}

impl ViewsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            filters_path: PathBuf::from(profiled_env_or(p, "VIEW_FILTERS_PATH", "./view/filter")),
            helpers_path: PathBuf::from(profiled_env_or(p, "VIEW_HELPERS_PATH", "./view/helper")),
            templates_path: PathBuf::from(profiled_env_or(
                p,
                "VIEW_TEMPLATES_PATH",
                "./view/template",
            )),
            template_extension: profiled_env_or(p, "VIEW_TEMPLATE_EXTENSION", "dust"),
            source_property: profiled_env_or(p, "VIEW_SOURCE_PROPERTY", "viewData"),
            template_property: profiled_env_or(p, "VIEW_TEMPLATE_PROPERTY", "template"),
            use_builtin_helpers: profiled_env_bool(p, "VIEW_BUILTIN_HELPERS", true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_is_production_only_for_production() {
        assert_eq!(DeploymentMode::parse("production"), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse(" PRODUCTION "), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse("prod"), DeploymentMode::Development);
        assert_eq!(DeploymentMode::parse(""), DeploymentMode::Development);
        assert!(!DeploymentMode::Development.is_production());
    }

    #[test]
    fn mode_displays_lowercase() {
        assert_eq!(DeploymentMode::Production.to_string(), "production");
        assert_eq!(DeploymentMode::Development.to_string(), "development");
    }

    #[test]
    fn parse_bool_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("On"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn profile_specific_key_wins() {
        env::set_var("GRIMETEST_VIEW_TEMPLATE_EXTENSION", "html");
        let cfg = Config::for_profile("grimetest");
        assert_eq!(cfg.profile, "GRIMETEST");
        assert_eq!(cfg.views.template_extension, "html");
        assert_eq!(cfg.views.source_property, "viewData");
        env::remove_var("GRIMETEST_VIEW_TEMPLATE_EXTENSION");
    }
}
