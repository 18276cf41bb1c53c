//! ---
//! rda_section: "06-security-access-control"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Capability model, lockout prevention, and request-forgery tokens."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! Advisory lockout check run before an access policy change is submitted.
//!
//! The check only warns the operator; enforcement happens wherever dashboard
//! access is gated by the resolved capability.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capability::{sanitize_key, CapabilityAliases, CapabilitySet, Operator, RoleAlias};
use crate::metrics::LockoutMetrics;
use crate::nonce::{NonceIssuer, LOCKOUT_NONCE_ACTION};

/// Request-validation failures of the lockout check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockoutError {
    /// Anti-forgery token missing or invalid.
    #[error("request failed anti-forgery verification")]
    ForbiddenRequest,
    /// No capability was sent.
    #[error("A capability must be sent with the request.")]
    MissingCapability,
    /// No switch value was sent.
    #[error("A capability switch value must be sent with the request.")]
    MissingSwitchContext,
}

impl LockoutError {
    /// Machine-readable error code returned to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            LockoutError::ForbiddenRequest => "forbidden",
            LockoutError::MissingCapability => "missing_cap",
            LockoutError::MissingSwitchContext => "missing_switch",
        }
    }
}

/// Warning text selected by the switch the operator is about to save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningTemplate {
    /// Administrators-only preset.
    Admin,
    /// Editors-and-above preset.
    Editor,
    /// Authors-and-above preset.
    Author,
    /// Custom capability or anything unrecognised.
    Generic,
}

impl WarningTemplate {
    /// Pick the template for a switch value.
    pub fn for_switch(switch: &str, aliases: &CapabilityAliases) -> Self {
        match aliases.alias_for(switch) {
            Some(RoleAlias::Admin) => WarningTemplate::Admin,
            Some(RoleAlias::Editor) => WarningTemplate::Editor,
            Some(RoleAlias::Author) => WarningTemplate::Author,
            None => WarningTemplate::Generic,
        }
    }

    /// Template text; `%s` marks where the formatted capability goes.
    pub fn template(&self) -> &'static str {
        match self {
            WarningTemplate::Admin => "<strong>Warning:</strong> Your account doesn&#8217;t have the Admin capability, %s, which could lock you out of the dashboard.",
            WarningTemplate::Editor => "<strong>Warning:</strong> Your account doesn&#8217;t have the Editor or Admin capability, %s, which could lock you out of the dashboard.",
            WarningTemplate::Author => "<strong>Warning:</strong> Your account doesn&#8217;t have the Author, Editor, or Admin capability, %s, which could lock you out of the dashboard.",
            WarningTemplate::Generic => "<strong>Warning:</strong> Your account doesn&#8217;t have the %s capability, which could lock you out of the dashboard.",
        }
    }

    /// Substitute an already formatted capability into the template.
    pub fn render(&self, formatted_capability: &str) -> String {
        self.template().replacen("%s", formatted_capability, 1)
    }
}

/// Details of a failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutWarning {
    /// Template chosen from the switch context.
    pub template: WarningTemplate,
    /// Capability the operator is missing.
    pub capability: String,
}

impl LockoutWarning {
    /// Render with caller-supplied formatting for the capability slug.
    pub fn message_with<F>(&self, format_capability: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        self.template.render(&format_capability(&self.capability))
    }

    /// Render with the slug as inline code markup.
    pub fn html_message(&self) -> String {
        self.message_with(|cap| format!("<code>{cap}</code>"))
    }
}

/// Result of a check that passed request validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockoutOutcome {
    /// The operator holds the capability.
    Allowed,
    /// The operator would be locked out.
    Warning(LockoutWarning),
}

impl LockoutOutcome {
    /// Whether the check passed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, LockoutOutcome::Allowed)
    }
}

/// Raw request parameters as submitted by the settings screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutRequest {
    /// Capability the operator is about to select.
    #[serde(default)]
    pub cap: Option<String>,
    /// Switch value giving the warning its context.
    #[serde(default)]
    pub switch: Option<String>,
    /// Anti-forgery token.
    #[serde(default)]
    pub nonce: Option<String>,
}

/// Check whether `held` contains `capability`, selecting a warning template if not.
///
/// Both inputs are normalised with [`sanitize_key`] first; an input that is empty
/// afterwards is reported as missing.
pub fn check_lockout(
    capability: &str,
    switch: &str,
    held: &CapabilitySet,
    aliases: &CapabilityAliases,
) -> Result<LockoutOutcome, LockoutError> {
    let capability = sanitize_key(capability);
    if capability.is_empty() {
        return Err(LockoutError::MissingCapability);
    }
    let switch = sanitize_key(switch);
    if switch.is_empty() {
        return Err(LockoutError::MissingSwitchContext);
    }

    if held.contains(&capability) {
        return Ok(LockoutOutcome::Allowed);
    }

    Ok(LockoutOutcome::Warning(LockoutWarning {
        template: WarningTemplate::for_switch(&switch, aliases),
        capability,
    }))
}

/// Request-level lockout check: token verification, then [`check_lockout`].
#[derive(Debug, Clone)]
pub struct LockoutGuard {
    aliases: CapabilityAliases,
    nonces: Arc<NonceIssuer>,
    metrics: Option<LockoutMetrics>,
}

impl LockoutGuard {
    /// Create a guard over the alias table and token issuer.
    pub fn new(aliases: CapabilityAliases, nonces: Arc<NonceIssuer>) -> Self {
        Self {
            aliases,
            nonces,
            metrics: None,
        }
    }

    /// Record outcomes in the given metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: LockoutMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Alias table used for template selection.
    pub fn aliases(&self) -> &CapabilityAliases {
        &self.aliases
    }

    /// Issue a token the operator must present with the check.
    pub fn issue_token(&self, operator: &Operator) -> String {
        self.nonces.issue(LOCKOUT_NONCE_ACTION, &operator.id)
    }

    /// Validate and evaluate a check request for the operator.
    pub fn check(
        &self,
        request: &LockoutRequest,
        operator: &Operator,
    ) -> Result<LockoutOutcome, LockoutError> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_check();
        }

        let token = request.nonce.as_deref().unwrap_or_default();
        if self
            .nonces
            .verify(token, LOCKOUT_NONCE_ACTION, &operator.id)
            .is_none()
        {
            warn!(operator = %operator.id, "lockout check rejected: invalid token");
            if let Some(metrics) = &self.metrics {
                metrics.inc_forbidden();
            }
            return Err(LockoutError::ForbiddenRequest);
        }

        let outcome = check_lockout(
            request.cap.as_deref().unwrap_or_default(),
            request.switch.as_deref().unwrap_or_default(),
            &operator.capabilities,
            &self.aliases,
        );

        match &outcome {
            Ok(LockoutOutcome::Allowed) => {
                debug!(operator = %operator.id, "lockout check passed");
            }
            Ok(LockoutOutcome::Warning(warning)) => {
                info!(operator = %operator.id, capability = %warning.capability, template = ?warning.template, "operator would be locked out");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_warning();
                }
            }
            Err(err) => {
                debug!(operator = %operator.id, code = err.code(), "lockout check request incomplete");
            }
        }
        outcome
    }
}
