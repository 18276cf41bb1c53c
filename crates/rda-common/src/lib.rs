//! ---
//! rda_section: "01-core-functionality"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Shared primitives and utilities for the dashboard access runtime."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! Core shared primitives for the dashboard access workspace.
//! This crate exposes configuration loading, logging setup, and the
//! clock helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    ApiConfig, AppConfig, CapabilityAliasConfig, LoggingConfig, OperatorConfig, SecurityConfig,
    SiteConfig, StoreConfig,
};
pub use logging::{init_tracing, LogFormat};

/// Version string reported by binaries and the API.
pub fn version_string() -> String {
    format!("dashboard-access {}", env!("CARGO_PKG_VERSION"))
}
