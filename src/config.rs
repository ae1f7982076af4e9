//! Layered configuration for fieldsync.
//!
//! Settings are read from `.fieldsync/fieldsync.toml`, then overridden by
//! environment variables, then by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [gateway]
//! base_url = "https://crm.example.com/api"
//! collection = "pipeline-7"
//! tenant = "acme"
//! timeout_secs = 15
//!
//! [autosave]
//! base_delay_ms = 800
//! min_new_field_delay_ms = 2000
//!
//! [cache]
//! field_types_ttl_secs = 300
//! ```
//!
//! The API token is only ever read from `FIELDSYNC_TOKEN` (or `.env`); it is
//! never written to the config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::autosave::AutoSaveConfig;

pub const CONFIG_DIR: &str = ".fieldsync";
pub const CONFIG_FILE: &str = "fieldsync.toml";

pub const ENV_BASE_URL: &str = "FIELDSYNC_BASE_URL";
pub const ENV_TOKEN: &str = "FIELDSYNC_TOKEN";
pub const ENV_TENANT: &str = "FIELDSYNC_TENANT";
pub const ENV_COLLECTION: &str = "FIELDSYNC_COLLECTION";

/// `[gateway]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// API root, e.g. `https://crm.example.com/api`
    #[serde(default)]
    pub base_url: Option<String>,
    /// Pipeline the fields belong to
    #[serde(default)]
    pub collection: Option<String>,
    /// Tenant slug sent as `X-Tenant`
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: None,
            collection: None,
            tenant: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// `[autosave]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveSection {
    /// Idle window for fields that already exist
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Floor for the idle window of brand-new drafts
    #[serde(default = "default_min_new_field_delay_ms")]
    pub min_new_field_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    800
}

fn default_min_new_field_delay_ms() -> u64 {
    2000
}

impl Default for AutosaveSection {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            min_new_field_delay_ms: default_min_new_field_delay_ms(),
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_field_types_ttl_secs")]
    pub field_types_ttl_secs: u64,
}

fn default_field_types_ttl_secs() -> u64 {
    300
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            field_types_ttl_secs: default_field_types_ttl_secs(),
        }
    }
}

/// The complete fieldsync.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldsyncToml {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub autosave: AutosaveSection,
    #[serde(default)]
    pub cache: CacheSection,
}

impl FieldsyncToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse fieldsync.toml")
    }

    /// Load from `<config_dir>/fieldsync.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize fieldsync.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the file contents and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match &self.gateway.base_url {
            None => warnings.push(format!(
                "No gateway.base_url set; {} must be provided at runtime",
                ENV_BASE_URL
            )),
            Some(url) if !is_http_url(url) => warnings.push(format!(
                "Invalid gateway.base_url '{}': expected an http:// or https:// URL",
                url
            )),
            Some(_) => {}
        }

        if self.gateway.timeout_secs == 0 {
            warnings.push("gateway.timeout_secs is 0; every request will time out".to_string());
        }
        if self.autosave.base_delay_ms == 0 {
            warnings.push("autosave.base_delay_ms is 0; edits will not be coalesced".to_string());
        }
        if self.autosave.min_new_field_delay_ms < self.autosave.base_delay_ms {
            warnings.push(format!(
                "autosave.min_new_field_delay_ms ({}) is below base_delay_ms ({}); new drafts get 2x base_delay_ms instead",
                self.autosave.min_new_field_delay_ms, self.autosave.base_delay_ms
            ));
        }

        warnings
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// First value present in CLI → env → file order.
fn pick(cli: Option<&str>, env: Option<String>, file: Option<&str>) -> Option<String> {
    cli.map(str::to_string)
        .or(env)
        .or_else(|| file.map(str::to_string))
        .filter(|v| !v.trim().is_empty())
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Connection settings resolved for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub token: Option<String>,
    pub tenant: Option<String>,
    pub timeout: Duration,
}

impl GatewaySettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            tenant: None,
            timeout: Duration::from_secs(default_timeout_secs()),
        }
    }
}

/// Effective configuration: file contents plus env and CLI overrides.
#[derive(Debug, Clone)]
pub struct FieldsyncConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: FieldsyncToml,
    /// CLI override for the API root
    pub cli_base_url: Option<String>,
    /// CLI override for the collection
    pub cli_collection: Option<String>,
}

impl FieldsyncConfig {
    /// Create a config from a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = FieldsyncToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            cli_base_url: None,
            cli_collection: None,
        })
    }

    /// Create a config with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        base_url: Option<String>,
        collection: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_base_url = base_url;
        config.cli_collection = collection;
        Ok(config)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// API root (CLI → env → file).
    pub fn base_url(&self) -> Option<String> {
        pick(
            self.cli_base_url.as_deref(),
            env_var(ENV_BASE_URL),
            self.toml.gateway.base_url.as_deref(),
        )
    }

    /// Collection (CLI → env → file).
    pub fn collection(&self) -> Option<String> {
        pick(
            self.cli_collection.as_deref(),
            env_var(ENV_COLLECTION),
            self.toml.gateway.collection.as_deref(),
        )
    }

    /// Tenant (env → file).
    pub fn tenant(&self) -> Option<String> {
        pick(None, env_var(ENV_TENANT), self.toml.gateway.tenant.as_deref())
    }

    /// API token (env only).
    pub fn token(&self) -> Option<String> {
        pick(None, env_var(ENV_TOKEN), None)
    }

    /// Everything the HTTP gateway needs, or an error naming the missing piece.
    pub fn gateway_settings(&self) -> Result<GatewaySettings> {
        let base_url = self.base_url().with_context(|| {
            format!(
                "No API base URL configured. Set gateway.base_url in {}, {} or --base-url",
                CONFIG_FILE, ENV_BASE_URL
            )
        })?;

        Ok(GatewaySettings {
            base_url,
            token: self.token(),
            tenant: self.tenant(),
            timeout: Duration::from_secs(self.toml.gateway.timeout_secs),
        })
    }

    pub fn autosave(&self) -> AutoSaveConfig {
        AutoSaveConfig::default()
            .with_base_delay(Duration::from_millis(self.toml.autosave.base_delay_ms))
            .with_min_new_field_delay(Duration::from_millis(
                self.toml.autosave.min_new_field_delay_ms,
            ))
    }

    pub fn field_types_ttl(&self) -> Duration {
        Duration::from_secs(self.toml.cache.field_types_ttl_secs)
    }

    /// File warnings plus warnings about the effective values.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if let Some(url) = &self.cli_base_url
            && !is_http_url(url)
        {
            warnings.push(format!("Invalid --base-url '{}'", url));
        }
        warnings
    }
}
