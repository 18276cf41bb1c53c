//! ---
//! rda_section: "05-networking-external-interfaces"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "HTTP surface for settings management and the lockout check."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! Assembly of the runtime components from an [`AppConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use rda_common::{AppConfig, StoreConfig};
use rda_security::{
    CapabilityAliases, LockoutGuard, LockoutMetrics, NonceIssuer, OperatorDirectory, RoleRegistry,
};
use rda_settings::{AccessPolicyResolver, FileStore, MemoryStore, SettingsStore};
use tracing::{info, warn};

use crate::ApiState;

/// Open the configured settings store.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SettingsStore>> {
    match &config.path {
        Some(path) => {
            let store = FileStore::open(path)
                .with_context(|| format!("failed to open settings store {}", path.display()))?;
            info!(path = %path.display(), "settings store opened");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no settings store path configured; settings are kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Components shared by the daemon and the control utility.
#[derive(Debug)]
pub struct Runtime {
    pub resolver: Arc<AccessPolicyResolver>,
    pub guard: LockoutGuard,
    pub operators: OperatorDirectory,
    pub roles: RoleRegistry,
    pub registry: Arc<Registry>,
}

impl Runtime {
    /// Build every component, running the legacy settings migration on the way.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = open_store(&config.store)?;
        Self::with_store(config, store)
    }

    /// Same as [`Runtime::from_config`] over an already opened store.
    pub fn with_store(config: &AppConfig, store: Arc<dyn SettingsStore>) -> Result<Self> {
        let aliases = CapabilityAliases::from_config(&config.capabilities);
        let resolver =
            AccessPolicyResolver::initialize(store, config.site.home_url.clone(), aliases.clone())
                .context("failed to initialise access policy resolver")?;

        let roles = RoleRegistry::default();
        let operators = OperatorDirectory::from_config(&config.operators, &roles)
            .context("failed to resolve configured operators")?;
        if operators.is_empty() {
            warn!("no operators configured; authenticated endpoints will reject every request");
        }

        let nonces =
            NonceIssuer::from_config(&config.security).context("failed to create nonce issuer")?;
        let registry = Arc::new(Registry::new());
        let metrics = LockoutMetrics::new(Arc::clone(&registry))?;
        let guard = LockoutGuard::new(aliases, Arc::new(nonces)).with_metrics(metrics);

        info!(
            operators = operators.len(),
            capability = %resolver.capability(),
            "dashboard access runtime assembled"
        );
        Ok(Self {
            resolver: Arc::new(resolver),
            guard,
            operators,
            roles,
            registry,
        })
    }

    /// Hand the components to the HTTP layer.
    pub fn into_state(self) -> ApiState {
        ApiState::new(self.resolver, self.guard, self.operators, self.roles)
            .with_metrics_registry(self.registry)
    }
}
