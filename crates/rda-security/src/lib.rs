//! ---
//! rda_section: "06-security-access-control"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Capability model, lockout prevention, and request-forgery tokens."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Capability and lockout policy for dashboard access.

pub mod capability;
pub mod lockout;
pub mod metrics;
pub mod nonce;

pub use capability::{
    sanitize_key, CapabilityAliases, CapabilitySet, Operator, OperatorDirectory, Role, RoleAlias,
    RoleError, RoleRegistry, ADMIN_CAPABILITY, CUSTOM_CAPABILITY_SWITCH,
};
pub use lockout::{
    check_lockout, LockoutError, LockoutGuard, LockoutOutcome, LockoutRequest, LockoutWarning,
    WarningTemplate,
};
pub use metrics::LockoutMetrics;
pub use nonce::{NonceAge, NonceError, NonceIssuer, LOCKOUT_NONCE_ACTION};
