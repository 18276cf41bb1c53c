//! ---
//! rda_section: "06-security-access-control"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Capability model, lockout prevention, and request-forgery tokens."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;
use rda_common::config::{CapabilityAliasConfig, OperatorConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Capability held by full administrators; the fallback whenever nothing else applies.
pub const ADMIN_CAPABILITY: &str = "manage_options";

/// Switch value signalling that a custom capability is in effect.
pub const CUSTOM_CAPABILITY_SWITCH: &str = "capability";

const DEFAULT_EDITOR_CAPABILITY: &str = "edit_others_posts";
const DEFAULT_AUTHOR_CAPABILITY: &str = "publish_posts";

/// Legacy numeric user levels carried by the built-in roles.
const MAX_USER_LEVEL: u8 = 10;

/// Normalise a request key: lowercase ASCII letters, digits, `_` and `-` survive.
pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|ch| ch.to_ascii_lowercase())
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-'))
        .collect()
}

/// One of the three preset access levels offered next to the custom capability option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleAlias {
    /// Administrators only.
    Admin,
    /// Editors and administrators.
    Editor,
    /// Authors, editors, and administrators.
    Author,
}

impl RoleAlias {
    /// All aliases in display order.
    pub const ALL: [RoleAlias; 3] = [RoleAlias::Admin, RoleAlias::Editor, RoleAlias::Author];

    /// Short key used in configuration and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleAlias::Admin => "admin",
            RoleAlias::Editor => "editor",
            RoleAlias::Author => "author",
        }
    }
}

impl fmt::Display for RoleAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from role alias to the capability that stands for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityAliases {
    /// Capability for administrators only.
    pub admin: String,
    /// Capability for editors and above.
    pub editor: String,
    /// Capability for authors and above.
    pub author: String,
}

impl Default for CapabilityAliases {
    fn default() -> Self {
        Self {
            admin: ADMIN_CAPABILITY.to_owned(),
            editor: DEFAULT_EDITOR_CAPABILITY.to_owned(),
            author: DEFAULT_AUTHOR_CAPABILITY.to_owned(),
        }
    }
}

impl CapabilityAliases {
    /// Defaults with any configured overrides applied.
    pub fn from_config(config: &CapabilityAliasConfig) -> Self {
        let defaults = Self::default();
        Self {
            admin: config.admin.clone().unwrap_or(defaults.admin),
            editor: config.editor.clone().unwrap_or(defaults.editor),
            author: config.author.clone().unwrap_or(defaults.author),
        }
    }

    /// Apply an override strategy to the mapping.
    #[must_use]
    pub fn with_override<F>(self, strategy: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let overridden = strategy(self);
        debug!(admin = %overridden.admin, editor = %overridden.editor, author = %overridden.author, "capability aliases overridden");
        overridden
    }

    /// Capability configured for an alias.
    pub fn capability(&self, alias: RoleAlias) -> &str {
        match alias {
            RoleAlias::Admin => &self.admin,
            RoleAlias::Editor => &self.editor,
            RoleAlias::Author => &self.author,
        }
    }

    /// Alias whose capability equals the given switch value, checked admin first.
    pub fn alias_for(&self, switch: &str) -> Option<RoleAlias> {
        RoleAlias::ALL
            .into_iter()
            .find(|alias| self.capability(*alias) == switch)
    }

    /// Pairs of alias and capability in display order.
    pub fn entries(&self) -> Vec<(RoleAlias, String)> {
        RoleAlias::ALL
            .into_iter()
            .map(|alias| (alias, self.capability(alias).to_owned()))
            .collect()
    }
}

/// Set of capability slugs held by a principal or granted by a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the slug is present.
    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains(capability)
    }

    /// Add a slug.
    pub fn insert(&mut self, capability: impl Into<String>) -> bool {
        self.0.insert(capability.into())
    }

    /// Merge another set into this one.
    pub fn extend_from(&mut self, other: &CapabilitySet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Iterate slugs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of slugs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Role describes a named set of capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier.
    pub name: String,
    /// Capabilities granted by the role.
    pub capabilities: CapabilitySet,
}

fn user_levels(max: u8) -> impl Iterator<Item = String> {
    (0..=max).map(|level| format!("level_{level}"))
}

const SUBSCRIBER_CAPS: &[&str] = &["read"];
const CONTRIBUTOR_CAPS: &[&str] = &["edit_posts", "delete_posts"];
const AUTHOR_CAPS: &[&str] = &[
    "upload_files",
    "edit_published_posts",
    "publish_posts",
    "delete_published_posts",
];
const EDITOR_CAPS: &[&str] = &[
    "moderate_comments",
    "manage_categories",
    "manage_links",
    "unfiltered_html",
    "edit_others_posts",
    "edit_pages",
    "edit_others_pages",
    "edit_published_pages",
    "publish_pages",
    "delete_pages",
    "delete_others_pages",
    "delete_published_pages",
    "delete_others_posts",
    "delete_private_posts",
    "edit_private_posts",
    "read_private_posts",
    "delete_private_pages",
    "edit_private_pages",
    "read_private_pages",
];
const ADMINISTRATOR_CAPS: &[&str] = &[
    "switch_themes",
    "edit_themes",
    "activate_plugins",
    "edit_plugins",
    "edit_users",
    "edit_files",
    "manage_options",
    "import",
    "export",
    "delete_users",
    "create_users",
    "unfiltered_upload",
    "edit_dashboard",
    "update_plugins",
    "delete_plugins",
    "install_plugins",
    "update_themes",
    "install_themes",
    "delete_themes",
    "update_core",
    "list_users",
    "remove_users",
    "promote_users",
    "edit_theme_options",
];

impl Role {
    fn tiered(name: &str, tiers: &[&[&str]], level: u8) -> Self {
        let capabilities = tiers
            .iter()
            .flat_map(|tier| tier.iter().map(|cap| (*cap).to_owned()))
            .chain(user_levels(level))
            .collect();
        Self {
            name: name.to_owned(),
            capabilities,
        }
    }

    /// Built-in administrator role with every capability.
    pub fn administrator() -> Self {
        Self::tiered(
            "administrator",
            &[
                SUBSCRIBER_CAPS,
                CONTRIBUTOR_CAPS,
                AUTHOR_CAPS,
                EDITOR_CAPS,
                ADMINISTRATOR_CAPS,
            ],
            MAX_USER_LEVEL,
        )
    }

    /// Editor role: manages everyone's content.
    pub fn editor() -> Self {
        Self::tiered(
            "editor",
            &[SUBSCRIBER_CAPS, CONTRIBUTOR_CAPS, AUTHOR_CAPS, EDITOR_CAPS],
            7,
        )
    }

    /// Author role: publishes own content.
    pub fn author() -> Self {
        Self::tiered(
            "author",
            &[SUBSCRIBER_CAPS, CONTRIBUTOR_CAPS, AUTHOR_CAPS],
            2,
        )
    }

    /// Contributor role: drafts only.
    pub fn contributor() -> Self {
        Self::tiered("contributor", &[SUBSCRIBER_CAPS, CONTRIBUTOR_CAPS], 1)
    }

    /// Subscriber role: read only.
    pub fn subscriber() -> Self {
        Self::tiered("subscriber", &[SUBSCRIBER_CAPS], 0)
    }
}

/// Errors occurring while resolving roles.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleError {
    /// Role not defined in the registry.
    #[error("role not found: {0}")]
    UnknownRole(String),
}

/// Registry of role definitions the host platform knows about.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: HashMap<String, Role>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        let mut registry = Self {
            roles: HashMap::new(),
        };
        registry.insert_role(Role::administrator());
        registry.insert_role(Role::editor());
        registry.insert_role(Role::author());
        registry.insert_role(Role::contributor());
        registry.insert_role(Role::subscriber());
        registry
    }
}

impl RoleRegistry {
    /// Registry pre-populated with the built-in roles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a role definition.
    pub fn insert_role(&mut self, role: Role) {
        self.roles.insert(role.name.clone(), role);
    }

    /// Lookup a role by name.
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    /// Union of capabilities granted by the named roles.
    pub fn capabilities_for(&self, roles: &[String]) -> Result<CapabilitySet, RoleError> {
        let mut held = CapabilitySet::new();
        for role_name in roles {
            let role = self
                .roles
                .get(role_name)
                .ok_or_else(|| RoleError::UnknownRole(role_name.clone()))?;
            held.extend_from(&role.capabilities);
        }
        Ok(held)
    }

    /// Capabilities offered in the custom-capability picker.
    ///
    /// Legacy user levels and bare numeric keys are left out; the result is sorted.
    pub fn available_capabilities(&self) -> Vec<String> {
        let levels: BTreeSet<String> = user_levels(MAX_USER_LEVEL).collect();
        let mut all = BTreeSet::new();
        for role in self.roles.values() {
            for cap in role.capabilities.iter() {
                if levels.contains(cap) || cap.chars().all(|ch| ch.is_ascii_digit()) {
                    continue;
                }
                all.insert(cap.to_owned());
            }
        }
        all.into_iter().collect()
    }
}

/// Principal making an administrative request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Stable identifier.
    pub id: String,
    /// Human readable name.
    pub display_name: String,
    /// Capabilities the host platform reports for this principal.
    pub capabilities: CapabilitySet,
}

impl Operator {
    /// Construct an operator with an explicit capability set.
    pub fn new(id: impl Into<String>, capabilities: CapabilitySet) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            capabilities,
        }
    }

    /// Whether the operator holds the capability.
    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Lookup table of operators, built from configuration.
#[derive(Debug, Clone, Default)]
pub struct OperatorDirectory {
    operators: HashMap<String, Operator>,
}

impl OperatorDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve configured operators against the role registry.
    pub fn from_config(
        config: &IndexMap<String, OperatorConfig>,
        roles: &RoleRegistry,
    ) -> Result<Self, RoleError> {
        let mut directory = Self::new();
        for (id, entry) in config {
            let mut held = roles.capabilities_for(&entry.roles)?;
            for cap in &entry.capabilities {
                held.insert(cap.clone());
            }
            let mut operator = Operator::new(id.clone(), held);
            if let Some(name) = &entry.display_name {
                operator.display_name = name.clone();
            }
            directory.insert(operator);
        }
        Ok(directory)
    }

    /// Insert or replace an operator.
    pub fn insert(&mut self, operator: Operator) {
        self.operators.insert(operator.id.clone(), operator);
    }

    /// Lookup an operator by id.
    pub fn get(&self, id: &str) -> Option<&Operator> {
        self.operators.get(id)
    }

    /// Number of known operators.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
