//! ---
//! rda_section: "04-configuration-orchestration"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Settings persistence, sanitizing, migration, and access policy resolution."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use rda_security::{CapabilityAliases, RoleAlias, ADMIN_CAPABILITY, CUSTOM_CAPABILITY_SWITCH};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::{is_empty_value, is_truthy, value_to_string};
use crate::store::{SettingsStore, StoreError};

/// Login message shown when the option has never been written.
pub const DEFAULT_LOGIN_MESSAGE: &str = "This site is in maintenance mode.";

/// Persisted settings fields, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingField {
    AccessSwitch,
    AccessCap,
    RedirectUrl,
    EnableProfile,
    LoginMessage,
}

impl SettingField {
    /// Registration order. Saves run sanitizers in this order.
    pub const ALL: [SettingField; 5] = [
        SettingField::AccessSwitch,
        SettingField::AccessCap,
        SettingField::RedirectUrl,
        SettingField::EnableProfile,
        SettingField::LoginMessage,
    ];

    /// Key under which the field is persisted and submitted.
    pub fn option_key(&self) -> &'static str {
        match self {
            SettingField::AccessSwitch => "rda_access_switch",
            SettingField::AccessCap => "rda_access_cap",
            SettingField::RedirectUrl => "rda_redirect_url",
            SettingField::EnableProfile => "rda_enable_profile",
            SettingField::LoginMessage => "rda_login_message",
        }
    }

    /// Short name used in the snapshot and debug output.
    pub fn name(&self) -> &'static str {
        match self {
            SettingField::AccessSwitch => "access_switch",
            SettingField::AccessCap => "access_cap",
            SettingField::RedirectUrl => "redirect_url",
            SettingField::EnableProfile => "enable_profile",
            SettingField::LoginMessage => "login_message",
        }
    }
}

/// Typed reading of the stored switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AccessSwitch {
    /// One of the preset role aliases.
    Alias(RoleAlias),
    /// The literal custom-capability token.
    Capability,
    /// A value that matches neither; treated as a custom capability.
    Other(String),
}

impl AccessSwitch {
    pub fn classify(raw: &str, aliases: &CapabilityAliases) -> Self {
        if raw == CUSTOM_CAPABILITY_SWITCH {
            return AccessSwitch::Capability;
        }
        match aliases.alias_for(raw) {
            Some(alias) => AccessSwitch::Alias(alias),
            None => AccessSwitch::Other(raw.to_owned()),
        }
    }
}

/// Snapshot of the site's dashboard access settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub access_switch: String,
    pub access_cap: String,
    pub enable_profile: bool,
    pub redirect_url: String,
    pub login_message: String,
}

impl Settings {
    /// Values written on activation.
    pub fn activation_defaults(home_url: &str) -> Self {
        Self {
            access_switch: ADMIN_CAPABILITY.to_owned(),
            access_cap: ADMIN_CAPABILITY.to_owned(),
            enable_profile: true,
            redirect_url: home_url.to_owned(),
            login_message: String::new(),
        }
    }

    /// Read a snapshot, substituting defaults for keys that were never written.
    pub fn load(store: &dyn SettingsStore, home_url: &str) -> Result<Self, StoreError> {
        let text = |field: SettingField, default: &str| -> Result<String, StoreError> {
            Ok(store
                .get(field.option_key())?
                .map_or_else(|| default.to_owned(), |value| value_to_string(&value)))
        };
        Ok(Self {
            access_switch: text(SettingField::AccessSwitch, ADMIN_CAPABILITY)?,
            access_cap: text(SettingField::AccessCap, ADMIN_CAPABILITY)?,
            enable_profile: store
                .get(SettingField::EnableProfile.option_key())?
                .map_or(true, |value| is_truthy(&value)),
            redirect_url: text(SettingField::RedirectUrl, home_url)?,
            login_message: text(SettingField::LoginMessage, DEFAULT_LOGIN_MESSAGE)?,
        })
    }

    /// Persist every field.
    pub fn store(&self, store: &dyn SettingsStore) -> Result<(), StoreError> {
        for field in SettingField::ALL {
            store.set(field.option_key(), self.value(field))?;
        }
        Ok(())
    }

    /// Value of a field in its persisted form.
    pub fn value(&self, field: SettingField) -> Value {
        match field {
            SettingField::AccessSwitch => Value::String(self.access_switch.clone()),
            SettingField::AccessCap => Value::String(self.access_cap.clone()),
            SettingField::RedirectUrl => Value::String(self.redirect_url.clone()),
            SettingField::EnableProfile => Value::Bool(self.enable_profile),
            SettingField::LoginMessage => Value::String(self.login_message.clone()),
        }
    }

    /// Typed view of the switch.
    pub fn switch(&self, aliases: &CapabilityAliases) -> AccessSwitch {
        AccessSwitch::classify(&self.access_switch, aliases)
    }

    /// Rows for the debug panel; empty values render as `empty`.
    pub fn debug_rows(&self) -> Vec<(&'static str, String)> {
        SettingField::ALL
            .into_iter()
            .map(|field| {
                let value = self.value(field);
                let rendered = if is_empty_value(&value) {
                    "empty".to_owned()
                } else {
                    value_to_string(&value)
                };
                (field.name(), rendered)
            })
            .collect()
    }
}
