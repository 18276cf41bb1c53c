//! ---
//! rda_section: "04-configuration-orchestration"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Settings persistence, sanitizing, migration, and access policy resolution."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! One-time conversion of the flat `rda-settings` record into per-field options.

use rda_security::{ADMIN_CAPABILITY, CUSTOM_CAPABILITY_SWITCH};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::model::Settings;
use crate::sanitize::{is_empty_value, is_truthy, value_to_string};
use crate::store::{SettingsStore, StoreError};

/// Key of the legacy settings record.
pub const LEGACY_SETTINGS_KEY: &str = "rda-settings";

/// What [`migrate_legacy_settings`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No legacy record was present.
    NotNeeded,
    /// The legacy record was translated, persisted and removed.
    Migrated(Settings),
    /// The legacy record was not an object and was removed without writing anything.
    Discarded,
}

/// Translate and remove the legacy record if one exists.
///
/// Must run before the first settings read; running it again after a migration
/// is a no-op because the legacy key is gone.
pub fn migrate_legacy_settings(
    store: &dyn SettingsStore,
    home_url: &str,
) -> Result<MigrationOutcome, StoreError> {
    let legacy = match store.get(LEGACY_SETTINGS_KEY)? {
        Some(value) if !is_empty_value(&value) => value,
        _ => return Ok(MigrationOutcome::NotNeeded),
    };

    let Value::Object(record) = legacy else {
        warn!(key = LEGACY_SETTINGS_KEY, "legacy settings record is not an object; discarding");
        store.delete(LEGACY_SETTINGS_KEY)?;
        return Ok(MigrationOutcome::Discarded);
    };

    let settings = translate(&record, home_url);
    settings.store(store)?;
    store.delete(LEGACY_SETTINGS_KEY)?;
    info!(
        access_switch = %settings.access_switch,
        access_cap = %settings.access_cap,
        "legacy dashboard access settings migrated"
    );
    Ok(MigrationOutcome::Migrated(settings))
}

fn translate(record: &Map<String, Value>, home_url: &str) -> Settings {
    let field = |key: &str| record.get(key).filter(|value| !is_empty_value(value));

    let access_switch = field("access_switch")
        .map_or_else(|| ADMIN_CAPABILITY.to_owned(), value_to_string);
    // A custom-capability switch loses its capability here; the legacy record
    // never stored one.
    let access_cap = if access_switch == CUSTOM_CAPABILITY_SWITCH {
        ADMIN_CAPABILITY.to_owned()
    } else {
        access_switch.clone()
    };

    Settings {
        access_cap,
        access_switch,
        redirect_url: field("redirect_url")
            .map_or_else(|| home_url.to_owned(), value_to_string),
        enable_profile: field("enable_profile").map_or(true, is_truthy),
        login_message: String::new(),
    }
}

/// Write the default record, replacing whatever is stored.
pub fn activate(store: &dyn SettingsStore, home_url: &str) -> Result<Settings, StoreError> {
    let settings = Settings::activation_defaults(home_url);
    settings.store(store)?;
    info!(home_url, "dashboard access defaults written");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SettingField;
    use crate::store::MemoryStore;
    use serde_json::json;

    const HOME: &str = "https://example.org/";

    fn stored(store: &MemoryStore, field: SettingField) -> Option<Value> {
        store.get(field.option_key()).unwrap()
    }

    #[test]
    fn absent_or_falsy_legacy_record_is_left_alone() {
        let store = MemoryStore::new();
        assert_eq!(
            migrate_legacy_settings(&store, HOME).unwrap(),
            MigrationOutcome::NotNeeded
        );
        assert_eq!(stored(&store, SettingField::AccessCap), None);

        let store = MemoryStore::with_values([(LEGACY_SETTINGS_KEY, json!(false))]);
        assert_eq!(
            migrate_legacy_settings(&store, HOME).unwrap(),
            MigrationOutcome::NotNeeded
        );
    }

    #[test]
    fn legacy_record_is_migrated_once() {
        let store = MemoryStore::with_values([(
            LEGACY_SETTINGS_KEY,
            json!({
                "access_switch": "edit_others_posts",
                "redirect_url": "https://example.org/away",
                "enable_profile": "1"
            }),
        )]);

        let MigrationOutcome::Migrated(settings) = migrate_legacy_settings(&store, HOME).unwrap()
        else {
            panic!("expected a migration");
        };
        assert_eq!(settings.access_switch, "edit_others_posts");
        assert_eq!(settings.access_cap, "edit_others_posts");
        assert_eq!(settings.redirect_url, "https://example.org/away");
        assert!(settings.enable_profile);
        assert_eq!(settings.login_message, "");

        for field in SettingField::ALL {
            assert!(stored(&store, field).is_some(), "{} not written", field.name());
        }
        assert_eq!(store.get(LEGACY_SETTINGS_KEY).unwrap(), None);

        store
            .set(SettingField::AccessCap.option_key(), json!("read"))
            .unwrap();
        assert_eq!(
            migrate_legacy_settings(&store, HOME).unwrap(),
            MigrationOutcome::NotNeeded
        );
        assert_eq!(stored(&store, SettingField::AccessCap), Some(json!("read")));
    }

    #[test]
    fn empty_legacy_fields_take_defaults() {
        let store = MemoryStore::with_values([(
            LEGACY_SETTINGS_KEY,
            json!({ "access_switch": "", "redirect_url": "", "enable_profile": "" }),
        )]);
        let MigrationOutcome::Migrated(settings) = migrate_legacy_settings(&store, HOME).unwrap()
        else {
            panic!("expected a migration");
        };
        assert_eq!(settings.access_switch, "manage_options");
        assert_eq!(settings.access_cap, "manage_options");
        assert_eq!(settings.redirect_url, HOME);
        assert!(settings.enable_profile);
    }

    #[test]
    fn custom_capability_switch_downgrades_to_admin_capability() {
        let store = MemoryStore::with_values([(
            LEGACY_SETTINGS_KEY,
            json!({ "access_switch": "capability" }),
        )]);
        let MigrationOutcome::Migrated(settings) = migrate_legacy_settings(&store, HOME).unwrap()
        else {
            panic!("expected a migration");
        };
        assert_eq!(settings.access_switch, "capability");
        assert_eq!(settings.access_cap, "manage_options");
    }

    #[test]
    fn non_object_legacy_record_is_discarded() {
        let store = MemoryStore::with_values([(LEGACY_SETTINGS_KEY, json!("edit_posts"))]);
        assert_eq!(
            migrate_legacy_settings(&store, HOME).unwrap(),
            MigrationOutcome::Discarded
        );
        assert_eq!(store.get(LEGACY_SETTINGS_KEY).unwrap(), None);
        assert_eq!(stored(&store, SettingField::AccessSwitch), None);
    }

    #[test]
    fn activate_overwrites_with_defaults() {
        let store = MemoryStore::with_values([("rda_access_cap", json!("read"))]);
        let settings = activate(&store, HOME).unwrap();
        assert_eq!(settings, Settings::activation_defaults(HOME));
        assert_eq!(stored(&store, SettingField::AccessCap), Some(json!("manage_options")));
        assert_eq!(stored(&store, SettingField::LoginMessage), Some(json!("")));
        assert_eq!(stored(&store, SettingField::EnableProfile), Some(json!(true)));
    }
}
