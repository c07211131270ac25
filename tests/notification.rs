//! Notification delivery through the HTTP stack, against a mock server.

use std::{sync::Arc, time::Duration};

use alarmist::{
    config::{AppConfig, EmailRelayConfig, HttpRetryConfig, JitterSetting},
    engine::{ReconciliationEngine, UnitOutcome},
    http_client::HttpClientPool,
    models::{Alarm, EventGroup, NotificationTarget},
    notification::{DispatchError, Dispatcher, NotificationService},
    persistence::traits::{AlarmRepository, ReceiptRepository},
    test_helpers::{AlarmDraftBuilder, ChainEventBuilder, erc20_abi, setup_test_db},
};
use alloy::primitives::{B256, address};
use chrono::Utc;
use mockito::Matcher;
use serde_json::json;
use url::Url;

fn no_retries() -> HttpRetryConfig {
    HttpRetryConfig { max_retries: 0, jitter: JitterSetting::None, ..Default::default() }
}

fn alarm_with(target: NotificationTarget) -> Alarm {
    Alarm {
        id: 7,
        address: address!("0x00000000000000000000000000000000000000aa"),
        abi: erc20_abi(),
        event_names: vec!["Transfer".to_string()],
        notification_target: target,
        block_confirmations: 0,
        created_at: Utc::now(),
    }
}

fn transfer_group() -> EventGroup {
    let event = ChainEventBuilder::new()
        .tx_hash(B256::repeat_byte(0x11))
        .block_height(42)
        .log_index(3)
        .payload(json!({ "value": 5 }))
        .build();
    EventGroup { tx_hash: event.tx_hash, events: vec![event] }
}

#[tokio::test]
async fn test_webhook_receives_signed_notification() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/alarm")
        .match_header("content-type", "application/json")
        .match_header("x-signature", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
        .match_header("x-timestamp", Matcher::Regex("^[0-9]+$".to_string()))
        .match_body(Matcher::PartialJson(json!({
            "alarm_id": 7,
            "block_height": 42,
            "events": [{ "event_name": "Transfer", "payload": { "value": 5 } }]
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let url = Url::parse(&format!("{}/alarm", server.url())).unwrap();
    let service = NotificationService::new(
        Arc::new(HttpClientPool::new()),
        no_retries(),
        Some("shh".to_string()),
        None,
    );

    let result =
        service.dispatch(&alarm_with(NotificationTarget::Webhook(url)), &transfer_group()).await;

    assert!(result.is_ok());
    mock.assert();
}

#[tokio::test]
async fn test_email_goes_through_relay() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/send")
        .match_header("authorization", "Bearer relay-token")
        .match_body(Matcher::PartialJson(json!({
            "to": "ops@example.com",
            "from": "alarms@example.com"
        })))
        .with_status(202)
        .create_async()
        .await;

    let relay = EmailRelayConfig {
        relay_url: Url::parse(&format!("{}/send", server.url())).unwrap(),
        sender: "alarms@example.com".to_string(),
        api_token: Some("relay-token".to_string()),
    };
    let service =
        NotificationService::new(Arc::new(HttpClientPool::new()), no_retries(), None, Some(relay));

    let alarm = alarm_with(NotificationTarget::Email("ops@example.com".to_string()));
    service.dispatch(&alarm, &transfer_group()).await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn test_email_without_relay_is_a_config_error() {
    let service =
        NotificationService::new(Arc::new(HttpClientPool::new()), no_retries(), None, None);

    let alarm = alarm_with(NotificationTarget::Email("ops@example.com".to_string()));
    let result = service.dispatch(&alarm, &transfer_group()).await;

    assert!(matches!(result, Err(DispatchError::Config(_))));
}

#[tokio::test]
async fn test_rejected_webhook_is_retried_on_next_pass() {
    let mut server = mockito::Server::new_async().await;
    let url = Url::parse(&format!("{}/alarm", server.url())).unwrap();

    let repo = Arc::new(setup_test_db().await);
    let alarm = repo
        .insert_alarm(&AlarmDraftBuilder::new().target(NotificationTarget::Webhook(url)).build())
        .await
        .unwrap();

    let config = Arc::new(AppConfig {
        database_url: "sqlite::memory:".to_string(),
        engine_concurrency: 1,
        dispatch_timeout: Duration::from_secs(5),
        http_retry_config: no_retries(),
        ..Default::default()
    });
    let service = Arc::new(NotificationService::from_config(
        &config,
        Arc::new(HttpClientPool::new()),
    ));
    let engine = ReconciliationEngine::from_config(repo.clone(), service, config);

    let tx_hash = B256::repeat_byte(0x11);
    let events = vec![ChainEventBuilder::new().tx_hash(tx_hash).block_height(1).build()];

    let refused = server.mock("POST", "/alarm").with_status(500).expect(1).create_async().await;
    let report = engine.reconcile(events.clone(), 1).await.unwrap();
    assert!(matches!(report.outcome_for(alarm.id, &tx_hash), Some(UnitOutcome::Failed { .. })));
    assert!(!repo.has_receipt(alarm.id, &tx_hash).await.unwrap());
    refused.assert();
    refused.remove_async().await;

    let accepted = server.mock("POST", "/alarm").with_status(200).expect(1).create_async().await;
    let report = engine.reconcile(events.clone(), 1).await.unwrap();
    assert_eq!(report.outcome_for(alarm.id, &tx_hash), Some(&UnitOutcome::Dispatched));
    assert!(repo.has_receipt(alarm.id, &tx_hash).await.unwrap());

    // Receipt present: the endpoint is not called again.
    let report = engine.reconcile(events, 1).await.unwrap();
    assert_eq!(report.already_notified(), 1);
    accepted.assert();
}
