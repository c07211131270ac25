//! Webhook delivery: a JSON POST, optionally signed with HMAC-SHA256.

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use sha2::Sha256;
use url::Url;

use super::error::DispatchError;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Sends JSON payloads to a single webhook endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    /// Webhook URL for message delivery
    url: Url,
    /// Configured HTTP client for webhook requests with retry capabilities
    client: Arc<ClientWithMiddleware>,
    /// Secret used to sign payloads
    secret: Option<String>,
}

impl WebhookNotifier {
    /// Creates a notifier for `url`. Payloads are signed when `secret` is set.
    pub fn new(url: Url, secret: Option<String>, client: Arc<ClientWithMiddleware>) -> Self {
        Self { url, client, secret }
    }

    /// Signs `payload` followed by the current millisecond timestamp.
    ///
    /// Returns the hex signature and the timestamp that was signed.
    pub fn sign_payload(
        &self,
        secret: &str,
        payload: &serde_json::Value,
    ) -> Result<(String, String), DispatchError> {
        // `new_from_slice` accepts empty keys
        if secret.is_empty() {
            return Err(DispatchError::Config("Invalid secret: cannot be empty.".to_string()));
        }

        let timestamp = Utc::now().timestamp_millis();

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| DispatchError::Config(format!("Invalid secret: {e}")))?;

        let serialized_payload = serde_json::to_string(payload)?;
        let message = format!("{serialized_payload}{timestamp}");
        mac.update(message.as_bytes());

        let signature = hex::encode(mac.finalize().into_bytes());

        Ok((signature, timestamp.to_string()))
    }

    /// POSTs `payload` to the webhook. Any non-2xx answer is a rejection.
    #[tracing::instrument(skip(self, payload), fields(url = %self.url), level = "debug")]
    pub async fn notify_json(&self, payload: &serde_json::Value) -> Result<(), DispatchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );

        if let Some(secret) = &self.secret {
            let (signature, timestamp) = self.sign_payload(secret, payload)?;

            headers.insert(
                HeaderName::from_static("x-signature"),
                HeaderValue::from_str(&signature).map_err(|e| {
                    DispatchError::Config(format!("Invalid signature value: {e}"))
                })?,
            );
            headers.insert(
                HeaderName::from_static("x-timestamp"),
                HeaderValue::from_str(&timestamp).map_err(|e| {
                    DispatchError::Config(format!("Invalid timestamp value: {e}"))
                })?,
            );
        }

        let response =
            self.client.post(self.url.clone()).headers(headers).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Webhook rejected notification.");
            return Err(DispatchError::Rejected(status.as_u16()));
        }

        tracing::debug!(status = %status, "Webhook accepted notification.");
        Ok(())
    }
}
