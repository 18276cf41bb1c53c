//! ---
//! rda_section: "01-core-functionality"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Shared primitives and utilities for the dashboard access runtime."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_home_url() -> String {
    "http://localhost/".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_nonce_lifetime() -> Duration {
    Duration::from_secs(86_400)
}

/// Primary configuration object for the dashboard access runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub capabilities: CapabilityAliasConfig,
    #[serde(default)]
    pub operators: IndexMap<String, OperatorConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "RDA_CONFIG";

    /// Load configuration from disk, respecting the `RDA_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.site.validate()?;
        self.capabilities.validate()?;
        for (id, operator) in &self.operators {
            if id.trim().is_empty() {
                return Err(anyhow!("operator identifiers cannot be empty"));
            }
            if operator.roles.is_empty() && operator.capabilities.is_empty() {
                return Err(anyhow!(
                    "operator '{}' must declare at least one role or capability",
                    id
                ));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Site-level facts the settings sanitizers depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_home_url")]
    pub home_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            home_url: default_home_url(),
        }
    }
}

impl SiteConfig {
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.home_url)
            .with_context(|| format!("site home_url '{}' is not a valid URL", self.home_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "site home_url must use http or https, found '{}'",
                url.scheme()
            ));
        }
        Ok(())
    }
}

/// Where persisted settings live. `None` keeps them in memory for the process lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Anti-forgery token settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Secret used to sign tokens. A random secret is generated at startup when unset,
    /// which invalidates outstanding tokens on restart.
    #[serde(default)]
    pub nonce_secret: Option<String>,
    #[serde(default = "default_nonce_lifetime")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub nonce_lifetime: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            nonce_secret: None,
            nonce_lifetime: default_nonce_lifetime(),
        }
    }
}

/// Overrides for the role-alias capabilities. Unset entries keep the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityAliasConfig {
    #[serde(default)]
    pub admin: Option<String>,
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

impl CapabilityAliasConfig {
    pub fn validate(&self) -> Result<()> {
        for (alias, value) in [
            ("admin", &self.admin),
            ("editor", &self.editor),
            ("author", &self.author),
        ] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(anyhow!("capability alias '{}' cannot be empty", alias));
                }
            }
        }
        Ok(())
    }
}

/// Operator known to the built-in directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorConfig {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_str("").unwrap();
        assert_eq!(config.site.home_url, "http://localhost/");
        assert!(config.store.path.is_none());
        assert_eq!(config.security.nonce_lifetime, Duration::from_secs(86_400));
        assert!(config.operators.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let config = AppConfig::from_str(
            r#"
            [site]
            home_url = "https://example.org/"

            [store]
            path = "var/options.json"

            [security]
            nonce_secret = "s3cret"
            nonce_lifetime = 3600

            [capabilities]
            editor = "edit_pages"

            [operators.alice]
            roles = ["administrator"]

            [operators.bob]
            capabilities = ["read", "edit_posts"]
            "#,
        )
        .unwrap();
        assert_eq!(config.site.home_url, "https://example.org/");
        assert_eq!(config.store.path, Some(PathBuf::from("var/options.json")));
        assert_eq!(config.security.nonce_lifetime, Duration::from_secs(3600));
        assert_eq!(config.capabilities.editor.as_deref(), Some("edit_pages"));
        assert_eq!(config.operators.len(), 2);
        assert_eq!(config.operators["bob"].capabilities.len(), 2);
    }

    #[test]
    fn rejects_non_http_home_url() {
        let err = AppConfig::from_str("[site]\nhome_url = \"ftp://example.org\"").unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn rejects_operator_without_grants() {
        let err = AppConfig::from_str("[operators.ghost]\n").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn load_with_source_picks_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("rda.toml");
        fs::write(&present, "[site]\nhome_url = \"https://a.example/\"\n").unwrap();
        let missing = dir.path().join("missing.toml");
        let loaded = AppConfig::load_with_source(&[missing, present.clone()]).unwrap();
        assert_eq!(loaded.source, present);
        assert_eq!(loaded.config.site.home_url, "https://a.example/");
    }
}
