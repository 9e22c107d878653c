//! Process-level configuration shared by the grime crates.

pub mod config;

pub use config::{Config, DeploymentMode};
