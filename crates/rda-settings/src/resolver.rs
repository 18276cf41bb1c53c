//! ---
//! rda_section: "04-configuration-orchestration"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Settings persistence, sanitizing, migration, and access policy resolution."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! Effective-capability resolution over a settings snapshot.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rda_security::{CapabilityAliases, ADMIN_CAPABILITY};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::login::output_login_message;
use crate::migrate::{migrate_legacy_settings, MigrationOutcome};
use crate::model::{AccessSwitch, SettingField, Settings};
use crate::sanitize::{sanitize_field, value_to_string, SanitizeContext};
use crate::store::{SettingsStore, StoreError};

/// Strategy applied to the resolved capability before it is used.
pub type CapabilityOverride = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Capability gating dashboard access for `settings`.
///
/// An empty stored or overridden value resolves to the admin capability.
pub fn resolve_capability(
    settings: &Settings,
    capability_override: Option<&(dyn Fn(&str) -> String + Send + Sync)>,
) -> String {
    let stored = if settings.access_cap.is_empty() {
        ADMIN_CAPABILITY
    } else {
        settings.access_cap.as_str()
    };
    let resolved = match capability_override {
        Some(strategy) => strategy(stored),
        None => stored.to_owned(),
    };
    if resolved.is_empty() {
        ADMIN_CAPABILITY.to_owned()
    } else {
        resolved
    }
}

/// Owns the settings snapshot and the save pipeline.
pub struct AccessPolicyResolver {
    store: Arc<dyn SettingsStore>,
    home_url: String,
    aliases: CapabilityAliases,
    capability_override: Option<CapabilityOverride>,
    snapshot: RwLock<Arc<Settings>>,
    save_lock: Mutex<()>,
}

impl fmt::Debug for AccessPolicyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPolicyResolver")
            .field("home_url", &self.home_url)
            .field("aliases", &self.aliases)
            .field("capability_override", &self.capability_override.is_some())
            .field("snapshot", &*self.snapshot.read())
            .finish()
    }
}

impl AccessPolicyResolver {
    /// Migrate any legacy record, then take the first snapshot.
    pub fn initialize(
        store: Arc<dyn SettingsStore>,
        home_url: impl Into<String>,
        aliases: CapabilityAliases,
    ) -> Result<Self, StoreError> {
        let home_url = home_url.into();
        match migrate_legacy_settings(store.as_ref(), &home_url)? {
            MigrationOutcome::NotNeeded => debug!("no legacy settings to migrate"),
            MigrationOutcome::Migrated(_) => info!("legacy settings migrated during initialization"),
            MigrationOutcome::Discarded => info!("malformed legacy settings discarded"),
        }
        let settings = Settings::load(store.as_ref(), &home_url)?;
        debug!(access_switch = %settings.access_switch, access_cap = %settings.access_cap, "settings snapshot loaded");
        Ok(Self {
            store,
            home_url,
            aliases,
            capability_override: None,
            snapshot: RwLock::new(Arc::new(settings)),
            save_lock: Mutex::new(()),
        })
    }

    /// Install a strategy that rewrites the resolved capability.
    #[must_use]
    pub fn with_capability_override(mut self, strategy: CapabilityOverride) -> Self {
        self.capability_override = Some(strategy);
        self
    }

    pub fn home_url(&self) -> &str {
        &self.home_url
    }

    pub fn aliases(&self) -> &CapabilityAliases {
        &self.aliases
    }

    /// Current snapshot. Callers hold it for as long as they need a consistent view.
    pub fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.snapshot.read())
    }

    /// Reload the snapshot from the store.
    pub fn refresh(&self) -> Result<Arc<Settings>, StoreError> {
        let settings = Arc::new(Settings::load(self.store.as_ref(), &self.home_url)?);
        *self.snapshot.write() = Arc::clone(&settings);
        Ok(settings)
    }

    /// Effective capability for the current snapshot.
    pub fn capability(&self) -> String {
        self.capability_for(&self.snapshot())
    }

    /// Effective capability for a snapshot the caller already holds.
    pub fn capability_for(&self, settings: &Settings) -> String {
        resolve_capability(settings, self.capability_override.as_deref())
    }

    /// Typed view of the current switch.
    pub fn switch(&self) -> AccessSwitch {
        self.snapshot().switch(&self.aliases)
    }

    /// Run submitted form values through the sanitizers and persist them.
    ///
    /// Fields are processed in registration order and each is written before
    /// the next sanitizer runs. Absent fields are treated as empty submissions.
    pub fn save(&self, submitted: &Map<String, Value>) -> Result<Arc<Settings>, StoreError> {
        let _guard = self.save_lock.lock();
        for field in SettingField::ALL {
            let ctx = SanitizeContext {
                home_url: self.home_url.clone(),
                persisted_switch: self
                    .store
                    .get(SettingField::AccessSwitch.option_key())?
                    .map(|value| value_to_string(&value)),
            };
            let raw = submitted.get(field.option_key()).unwrap_or(&Value::Null);
            let sanitized = sanitize_field(field, raw, &ctx);
            debug!(field = field.name(), value = %sanitized, "settings field sanitized");
            self.store.set(field.option_key(), sanitized)?;
        }
        let settings = self.refresh()?;
        info!(
            access_switch = %settings.access_switch,
            access_cap = %settings.access_cap,
            "dashboard access settings saved"
        );
        Ok(settings)
    }

    /// Login screen markup with the configured message appended.
    pub fn login_message(&self, existing: &str) -> String {
        output_login_message(existing, &self.snapshot())
    }

    /// Raw snapshot values for the debug panel.
    pub fn debug_rows(&self) -> Vec<(&'static str, String)> {
        self.snapshot().debug_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::LEGACY_SETTINGS_KEY;
    use crate::store::MemoryStore;
    use rda_security::RoleAlias;
    use serde_json::json;

    const HOME: &str = "https://example.org/";

    fn resolver_over(store: MemoryStore) -> AccessPolicyResolver {
        AccessPolicyResolver::initialize(Arc::new(store), HOME, CapabilityAliases::default())
            .unwrap()
    }

    fn form(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn resolve_returns_stored_capability() {
        let mut settings = Settings::activation_defaults(HOME);
        settings.access_cap = "edit_others_posts".into();
        assert_eq!(resolve_capability(&settings, None), "edit_others_posts");
        assert_eq!(
            resolve_capability(&settings, None),
            resolve_capability(&settings, None)
        );
    }

    #[test]
    fn resolve_defaults_empty_values_to_admin() {
        let mut settings = Settings::activation_defaults(HOME);
        settings.access_cap.clear();
        assert_eq!(resolve_capability(&settings, None), "manage_options");

        settings.access_cap = "read".into();
        let blank = |_: &str| String::new();
        assert_eq!(resolve_capability(&settings, Some(&blank)), "manage_options");
    }

    #[test]
    fn override_strategy_rewrites_result() {
        let resolver = resolver_over(MemoryStore::new()).with_capability_override(Arc::new(
            |cap: &str| {
                if cap == "manage_options" {
                    "manage_network".to_owned()
                } else {
                    cap.to_owned()
                }
            },
        ));
        assert_eq!(resolver.capability(), "manage_network");
    }

    #[test]
    fn initialize_migrates_before_first_read() {
        let resolver = resolver_over(MemoryStore::with_values([(
            LEGACY_SETTINGS_KEY,
            json!({ "access_switch": "publish_posts" }),
        )]));
        assert_eq!(resolver.capability(), "publish_posts");
        assert_eq!(resolver.switch(), AccessSwitch::Alias(RoleAlias::Author));
        assert_eq!(resolver.snapshot().login_message, "");
    }

    #[test]
    fn save_uses_switch_submitted_in_same_request() {
        let resolver = resolver_over(MemoryStore::new());
        let saved = resolver
            .save(&form(json!({
                "rda_access_switch": "edit_others_posts",
                "rda_access_cap": "",
                "rda_redirect_url": "",
                "rda_enable_profile": "1",
                "rda_login_message": "<b>Closed</b> today"
            })))
            .unwrap();
        assert_eq!(saved.access_switch, "edit_others_posts");
        assert_eq!(saved.access_cap, "edit_others_posts");
        assert_eq!(saved.redirect_url, HOME);
        assert!(saved.enable_profile);
        assert_eq!(saved.login_message, "Closed today");
        assert_eq!(resolver.capability(), "edit_others_posts");
    }

    #[test]
    fn save_treats_missing_fields_as_empty() {
        let resolver = resolver_over(MemoryStore::new());
        let saved = resolver
            .save(&form(json!({
                "rda_access_switch": "capability",
                "rda_access_cap": "manage_woocommerce"
            })))
            .unwrap();
        assert_eq!(saved.access_cap, "manage_woocommerce");
        assert!(!saved.enable_profile);
        assert_eq!(saved.login_message, "");
        assert_eq!(
            resolver.debug_rows()[3],
            ("enable_profile", "empty".to_owned())
        );
    }

    #[test]
    fn snapshot_held_across_save_is_unchanged() {
        let resolver = resolver_over(MemoryStore::new());
        let before = resolver.snapshot();
        resolver
            .save(&form(json!({ "rda_access_switch": "publish_posts" })))
            .unwrap();
        assert_eq!(before.access_cap, "manage_options");
        assert_eq!(resolver.snapshot().access_cap, "publish_posts");
        assert_eq!(resolver.capability_for(&before), "manage_options");
        assert_eq!(
            before.switch(resolver.aliases()),
            AccessSwitch::Alias(RoleAlias::Admin)
        );
    }

    #[test]
    fn login_message_uses_snapshot() {
        let resolver = resolver_over(MemoryStore::new());
        assert_eq!(
            resolver.login_message(""),
            "<p class=\"message\">This site is in maintenance mode.</p>"
        );
    }
}
