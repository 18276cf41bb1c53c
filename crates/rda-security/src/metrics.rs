//! ---
//! rda_section: "06-security-access-control"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Capability model, lockout prevention, and request-forgery tokens."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Lockout check counters exported via Prometheus.
#[derive(Clone)]
pub struct LockoutMetrics {
    registry: Arc<Registry>,
    checks_total: IntCounter,
    warnings_total: IntCounter,
    forbidden_total: IntCounter,
}

impl LockoutMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let checks_total = IntCounter::new("lockout_checks_total", "Total lockout checks served")?;
        let warnings_total = IntCounter::new(
            "lockout_warnings_total",
            "Lockout checks that returned a warning",
        )?;
        let forbidden_total = IntCounter::new(
            "lockout_forbidden_total",
            "Lockout checks rejected by the anti-forgery token",
        )?;

        registry.register(Box::new(checks_total.clone()))?;
        registry.register(Box::new(warnings_total.clone()))?;
        registry.register(Box::new(forbidden_total.clone()))?;

        Ok(Self {
            registry,
            checks_total,
            warnings_total,
            forbidden_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Increment served checks.
    pub fn inc_check(&self) {
        self.checks_total.inc();
    }

    /// Increment warnings.
    pub fn inc_warning(&self) {
        self.warnings_total.inc();
    }

    /// Increment forgery rejections.
    pub fn inc_forbidden(&self) {
        self.forbidden_total.inc();
    }
}

impl std::fmt::Debug for LockoutMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockoutMetrics")
            .field("checks_total", &self.checks_total.get())
            .field("warnings_total", &self.warnings_total.get())
            .field("forbidden_total", &self.forbidden_total.get())
            .finish_non_exhaustive()
    }
}
