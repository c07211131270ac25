//! # Notification dispatch
//!
//! The reconciliation engine hands every eligible (alarm, transaction) unit to
//! a [`Dispatcher`]. The shipped implementation, [`NotificationService`],
//! delivers to the alarm's target:
//!
//! - **Webhook**: the [`AlarmNotification`] JSON is POSTed to the URL, signed
//!   with `x-signature`/`x-timestamp` headers when a webhook secret is set.
//! - **Email**: a plain-text summary is handed to the configured mail relay.
//!
//! HTTP clients come from a shared `HttpClientPool` and retry transient
//! failures according to the configured `HttpRetryConfig`.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use url::Url;

use crate::{
    config::{AppConfig, EmailRelayConfig, HttpRetryConfig},
    http_client::HttpClientPool,
    models::{Alarm, ChainEvent, EventGroup, NotificationTarget},
};

mod email;
pub mod error;
mod webhook;

pub use email::EmailRelayNotifier;
pub use error::DispatchError;
pub use webhook::WebhookNotifier;

/// Delivers one notification for one (alarm, transaction) unit.
///
/// Delivery is at-least-once: the engine only records a receipt after
/// `dispatch` returns `Ok`, so a failed or timed-out call is repeated on a
/// later pass.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Notifies `alarm`'s target about the events in `group`.
    async fn dispatch(&self, alarm: &Alarm, group: &EventGroup) -> Result<(), DispatchError>;
}

/// The JSON document delivered to webhooks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmNotification<'a> {
    /// Alarm that matched.
    pub alarm_id: i64,
    /// Watched contract.
    pub address: Address,
    /// Transaction that emitted the events.
    pub tx_hash: B256,
    /// Block containing the transaction.
    pub block_height: u64,
    /// Matched events, in emission order.
    pub events: &'a [ChainEvent],
}

impl<'a> AlarmNotification<'a> {
    /// Builds the notification for `alarm` and `group`.
    pub fn new(alarm: &Alarm, group: &'a EventGroup) -> Self {
        Self {
            alarm_id: alarm.id,
            address: alarm.address,
            tx_hash: group.tx_hash,
            block_height: group.block_height(),
            events: &group.events,
        }
    }

    /// Subject line used for email delivery.
    pub fn subject(&self) -> String {
        let noun = if self.events.len() == 1 { "event" } else { "events" };
        format!("Alarm {}: {} {noun} on {}", self.alarm_id, self.events.len(), self.address)
    }

    /// Plain-text body used for email delivery.
    pub fn text_body(&self) -> String {
        let mut body =
            format!("Transaction {} in block {}\n\n", self.tx_hash, self.block_height);
        for event in self.events {
            body.push_str(&format!("- {}: {}\n", event.event_name, event.payload));
        }
        body
    }
}

/// Delivers alarm notifications over HTTP.
pub struct NotificationService {
    /// A thread-safe pool for creating and reusing HTTP clients.
    client_pool: Arc<HttpClientPool>,
    /// Retry policy applied to every delivery.
    retry_policy: HttpRetryConfig,
    /// Signs webhook payloads when set.
    webhook_secret: Option<String>,
    /// Relay for email targets.
    email: Option<EmailRelayConfig>,
}

impl NotificationService {
    /// Creates a service from its parts. An empty webhook secret leaves
    /// webhooks unsigned.
    pub fn new(
        client_pool: Arc<HttpClientPool>,
        retry_policy: HttpRetryConfig,
        webhook_secret: Option<String>,
        email: Option<EmailRelayConfig>,
    ) -> Self {
        let webhook_secret = webhook_secret.filter(|secret| {
            if secret.is_empty() {
                tracing::warn!("Webhook secret is empty, webhooks will be sent unsigned.");
            }
            !secret.is_empty()
        });
        Self { client_pool, retry_policy, webhook_secret, email }
    }

    /// Creates a service from the application configuration.
    pub fn from_config(config: &AppConfig, client_pool: Arc<HttpClientPool>) -> Self {
        Self::new(
            client_pool,
            config.http_retry_config.clone(),
            config.webhook_secret.clone(),
            config.email.clone(),
        )
    }

    async fn send_webhook(
        &self,
        url: &Url,
        notification: &AlarmNotification<'_>,
    ) -> Result<(), DispatchError> {
        let client = self.client_pool.get_or_create(&self.retry_policy).await?;
        let payload = serde_json::to_value(notification)?;
        WebhookNotifier::new(url.clone(), self.webhook_secret.clone(), client)
            .notify_json(&payload)
            .await
    }

    async fn send_email(
        &self,
        to: &str,
        notification: &AlarmNotification<'_>,
    ) -> Result<(), DispatchError> {
        let relay = self.email.clone().ok_or_else(|| {
            DispatchError::Config("email target configured but no mail relay is set".to_string())
        })?;
        let client = self.client_pool.get_or_create(&self.retry_policy).await?;
        EmailRelayNotifier::new(relay, client)
            .send(to, &notification.subject(), &notification.text_body())
            .await
    }
}

#[async_trait]
impl Dispatcher for NotificationService {
    #[tracing::instrument(
        skip(self, alarm, group),
        fields(
            alarm_id = alarm.id,
            tx_hash = %group.tx_hash,
            notification_kind = alarm.notification_target.kind()
        )
    )]
    async fn dispatch(&self, alarm: &Alarm, group: &EventGroup) -> Result<(), DispatchError> {
        let notification = AlarmNotification::new(alarm, group);
        match &alarm.notification_target {
            NotificationTarget::Webhook(url) => self.send_webhook(url, &notification).await?,
            NotificationTarget::Email(to) => self.send_email(to, &notification).await?,
        }
        tracing::info!(event_count = group.events.len(), "Notification delivered.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::b256;
    use chrono::Utc;
    use mockito::Matcher;
    use serde_json::json;

    use super::*;
    use crate::{
        config::JitterSetting,
        test_helpers::{ChainEventBuilder, erc20_abi},
    };

    const TX: B256 = b256!("0x00000000000000000000000000000000000000000000000000000000000000cc");

    fn alarm_with(target: NotificationTarget) -> Alarm {
        Alarm {
            id: 5,
            address: ChainEventBuilder::new().build().address,
            abi: erc20_abi(),
            event_names: vec!["Transfer".to_string()],
            notification_target: target,
            block_confirmations: 0,
            created_at: Utc::now(),
        }
    }

    fn group() -> EventGroup {
        let event = ChainEventBuilder::new()
            .tx_hash(TX)
            .block_height(42)
            .payload(json!({"value": "100"}))
            .build();
        EventGroup::group_by_transaction(vec![event]).remove(0)
    }

    fn no_retries() -> HttpRetryConfig {
        HttpRetryConfig { max_retries: 0, jitter: JitterSetting::None, ..Default::default() }
    }

    fn service(email: Option<EmailRelayConfig>) -> NotificationService {
        NotificationService::new(Arc::new(HttpClientPool::new()), no_retries(), None, email)
    }

    #[test]
    fn test_notification_shape() {
        let alarm = alarm_with(NotificationTarget::Email("a@b.c".to_string()));
        let group = group();
        let notification = AlarmNotification::new(&alarm, &group);

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["alarm_id"], 5);
        assert_eq!(value["block_height"], 42);
        assert_eq!(value["events"][0]["event_name"], "Transfer");
        assert_eq!(notification.subject(), format!("Alarm 5: 1 event on {}", alarm.address));
        assert!(notification.text_body().contains("block 42"));
    }

    #[tokio::test]
    async fn test_dispatch_webhook_posts_notification() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/alarm")
            .match_body(Matcher::PartialJson(json!({"alarm_id": 5, "block_height": 42})))
            .with_status(200)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/alarm", server.url())).unwrap();
        let alarm = alarm_with(NotificationTarget::Webhook(url));

        service(None).dispatch(&alarm, &group()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_webhook_secret_sends_unsigned() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/alarm")
            .match_header("x-signature", Matcher::Missing)
            .match_header("x-timestamp", Matcher::Missing)
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let service = NotificationService::new(
            Arc::new(HttpClientPool::new()),
            no_retries(),
            Some(String::new()),
            None,
        );
        assert!(service.webhook_secret.is_none());

        let url = Url::parse(&format!("{}/alarm", server.url())).unwrap();
        let alarm = alarm_with(NotificationTarget::Webhook(url));

        service.dispatch(&alarm, &group()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dispatch_email_without_relay_is_config_error() {
        let alarm = alarm_with(NotificationTarget::Email("ops@example.com".to_string()));
        let result = service(None).dispatch(&alarm, &group()).await;
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[tokio::test]
    async fn test_dispatch_email_goes_through_relay() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "to": "ops@example.com",
                "from": "alarms@example.com"
            })))
            .with_status(200)
            .create_async()
            .await;

        let relay = EmailRelayConfig {
            relay_url: Url::parse(&server.url()).unwrap(),
            sender: "alarms@example.com".to_string(),
            api_token: None,
        };
        let alarm = alarm_with(NotificationTarget::Email("ops@example.com".to_string()));

        service(Some(relay)).dispatch(&alarm, &group()).await.unwrap();
        mock.assert_async().await;
    }
}
