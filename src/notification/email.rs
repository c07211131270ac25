//! Email delivery through an HTTP mail relay.

use std::sync::Arc;

use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

use super::error::DispatchError;
use crate::config::EmailRelayConfig;

/// Body POSTed to the relay.
#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Hands outgoing mail to the configured relay endpoint.
#[derive(Debug)]
pub struct EmailRelayNotifier {
    config: EmailRelayConfig,
    client: Arc<ClientWithMiddleware>,
}

impl EmailRelayNotifier {
    /// Creates a notifier posting to `config.relay_url`.
    pub fn new(config: EmailRelayConfig, client: Arc<ClientWithMiddleware>) -> Self {
        Self { config, client }
    }

    /// Sends one message. Any non-2xx answer from the relay is a rejection.
    #[tracing::instrument(
        skip(self, body),
        fields(relay = %self.config.relay_url),
        level = "debug"
    )]
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DispatchError> {
        let message = RelayMessage { to, from: &self.config.sender, subject, body };

        let mut request = self.client.post(self.config.relay_url.clone()).json(&message);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Mail relay rejected message.");
            return Err(DispatchError::Rejected(status.as_u16()));
        }

        tracing::debug!(status = %status, "Mail relay accepted message.");
        Ok(())
    }
}
