//! Configuration module for Alarmist.

mod app_config;
mod helpers;
mod http_base;
mod http_retry;

pub use app_config::{AbiLookupConfig, AppConfig, ConfigurationProvider, EmailRelayConfig};
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};
pub use http_base::BaseHttpClientConfig;
pub use http_retry::{HttpRetryConfig, JitterSetting};
