use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{BaseHttpClientConfig, HttpRetryConfig, deserialize_duration_from_seconds};

/// Provides the default value for engine_concurrency.
fn default_engine_concurrency() -> usize {
    8
}

/// Provides the default value for dispatch_timeout_secs.
fn default_dispatch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_abi_lookup_base_url() -> String {
    "https://api.etherscan.io/api".to_string()
}

/// Supplies deployment-wide tunables to the reconciliation core.
pub trait ConfigurationProvider: Send + Sync {
    /// Number of blocks to wait before a block is trusted as final.
    fn reorg_safety(&self) -> u64;
}

/// Mail relay used to deliver email notifications.
///
/// Notifications are POSTed as JSON (`to`, `from`, `subject`, `body`) to
/// `relay_url`; the relay owns SMTP delivery.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EmailRelayConfig {
    /// Endpoint accepting outgoing mail.
    pub relay_url: Url,
    /// Sender address placed in the `from` field.
    pub sender: String,
    /// Optional bearer token sent in the `Authorization` header.
    #[serde(default)]
    pub api_token: Option<String>,
}

/// Etherscan-compatible ABI lookup endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AbiLookupConfig {
    /// Base URL of the `module=contract&action=getabi` API.
    #[serde(default = "default_abi_lookup_base_url")]
    pub base_url: String,
    /// API key appended as `apikey` when present.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AbiLookupConfig {
    fn default() -> Self {
        Self { base_url: default_abi_lookup_base_url(), api_key: None }
    }
}

/// Application configuration for Alarmist.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Blocks to wait before treating a block as final. Alarms may require
    /// more confirmations, never fewer.
    pub reorg_safety_blocks: u64,

    /// Maximum number of (alarm, transaction) units reconciled concurrently.
    #[serde(default = "default_engine_concurrency")]
    pub engine_concurrency: usize,

    /// Upper bound for a single dispatch, retries included.
    #[serde(
        rename = "dispatch_timeout_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_dispatch_timeout"
    )]
    pub dispatch_timeout: Duration,

    /// Retry policy for notification delivery and ABI lookups.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,

    /// Configuration for the base HTTP client.
    #[serde(default)]
    pub http_base_config: BaseHttpClientConfig,

    /// Secret used to sign webhook payloads. Unsigned when absent.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Mail relay for email alarms. Email dispatch fails when absent.
    #[serde(default)]
    pub email: Option<EmailRelayConfig>,

    /// ABI lookup endpoint.
    #[serde(default)]
    pub abi_lookup: AbiLookupConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            reorg_safety_blocks: 0,
            engine_concurrency: default_engine_concurrency(),
            dispatch_timeout: default_dispatch_timeout(),
            http_retry_config: HttpRetryConfig::default(),
            http_base_config: BaseHttpClientConfig::default(),
            webhook_secret: None,
            email: None,
            abi_lookup: AbiLookupConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the configuration
    /// directory, with `ALARMIST__*` environment overrides.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("ALARMIST").separator("__").try_parsing(true))
            .build()?;
        s.try_deserialize()
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

impl ConfigurationProvider for AppConfig {
    fn reorg_safety(&self) -> u64 {
        self.reorg_safety_blocks
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn reorg_safety_blocks(mut self, blocks: u64) -> Self {
        self.config.reorg_safety_blocks = blocks;
        self
    }

    pub fn engine_concurrency(mut self, concurrency: usize) -> Self {
        self.config.engine_concurrency = concurrency;
        self
    }

    pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.config.dispatch_timeout = timeout;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
