//! ---
//! rda_section: "04-configuration-orchestration"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Settings persistence, sanitizing, migration, and access policy resolution."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! Settings management for dashboard access.
//!
//! Persisted options live in a [`SettingsStore`]. [`AccessPolicyResolver`] owns
//! an immutable [`Settings`] snapshot, runs the legacy migration before the first
//! read, and routes saves through the per-field sanitizers.

pub mod login;
pub mod migrate;
pub mod model;
pub mod resolver;
pub mod sanitize;
pub mod store;

pub use login::{escape_html, output_login_message};
pub use migrate::{activate, migrate_legacy_settings, MigrationOutcome, LEGACY_SETTINGS_KEY};
pub use model::{AccessSwitch, SettingField, Settings, DEFAULT_LOGIN_MESSAGE};
pub use resolver::{resolve_capability, AccessPolicyResolver, CapabilityOverride};
pub use sanitize::{sanitize_field, SanitizeContext};
pub use store::{FileStore, MemoryStore, SettingsStore, StoreError};
