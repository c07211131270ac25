//! A reusable, thread-safe pool of retrying HTTP clients.
//!
//! Webhook delivery, the email relay and ABI lookups all draw their clients
//! from one `HttpClientPool`.

use std::{collections::HashMap, sync::Arc};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::{BaseHttpClientConfig, HttpRetryConfig};

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// A pool for managing and reusing HTTP clients.
///
/// Clients are keyed by their `HttpRetryConfig`, so different retry strategies
/// get isolated clients. Every client shares the connection settings of the
/// pool's `BaseHttpClientConfig`.
pub struct HttpClientPool {
    base_config: BaseHttpClientConfig,
    clients: Arc<RwLock<HashMap<String, Arc<ClientWithMiddleware>>>>,
}

impl HttpClientPool {
    /// Creates a new, empty `HttpClientPool` with default connection settings.
    pub fn new() -> Self {
        Self::with_base_config(BaseHttpClientConfig::default())
    }

    /// Creates a new, empty `HttpClientPool` using `base_config` for every
    /// client it builds.
    pub fn with_base_config(base_config: BaseHttpClientConfig) -> Self {
        Self {
            base_config,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Gets the client for `retry_policy`, creating it on first use.
    ///
    /// Double-checked locking: a read lock on the fast path, a write lock only
    /// when the client has to be built.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        let key = format!("{retry_policy:?}");

        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let base_client = ReqwestClient::builder()
            .pool_max_idle_per_host(self.base_config.max_idle_per_host)
            .pool_idle_timeout(Some(self.base_config.idle_timeout))
            .connect_timeout(self.base_config.connect_timeout)
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(key, new_client.clone());
        tracing::debug!(client_count = clients.len(), "Created pooled HTTP client.");

        Ok(new_client)
    }

    /// Returns the number of active HTTP clients in the pool.
    #[cfg(test)]
    pub async fn get_active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new()
    }
}
