//! Error types for notification dispatch.

use std::time::Duration;

use thiserror::Error;

use crate::http_client::HttpClientPoolError;

/// Reasons a notification could not be delivered.
///
/// Every variant is treated as retryable by the reconciliation engine: the
/// unit is left without a receipt and is offered again on the next pass.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatch did not complete within the configured bound.
    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// The receiving endpoint answered with a non-success status.
    #[error("Notification rejected with HTTP status {0}")]
    Rejected(u16),

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// Invalid or missing configuration for the alarm's target.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpClientPoolError),

    /// The notification body could not be serialized.
    #[error("Failed to serialize notification payload: {0}")]
    Payload(#[from] serde_json::Error),
}
