//! Alarm: a rule watching a contract address for named events.

use alloy::{json_abi::JsonAbi, primitives::Address};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Where a matched alarm is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum NotificationTarget {
    /// An email recipient.
    Email(String),
    /// A webhook endpoint receiving a JSON POST.
    Webhook(Url),
}

impl NotificationTarget {
    /// The stored discriminator, `"email"` or `"webhook"`.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationTarget::Email(_) => "email",
            NotificationTarget::Webhook(_) => "webhook",
        }
    }

    /// The stored destination (email address or URL).
    pub fn value(&self) -> String {
        match self {
            NotificationTarget::Email(email) => email.clone(),
            NotificationTarget::Webhook(url) => url.to_string(),
        }
    }

    /// Rebuilds a target from its stored `(kind, value)` columns.
    pub fn from_parts(kind: &str, value: &str) -> Result<Self, String> {
        match kind {
            "email" => Ok(NotificationTarget::Email(value.to_string())),
            "webhook" => Url::parse(value)
                .map(NotificationTarget::Webhook)
                .map_err(|e| format!("invalid webhook url '{value}': {e}")),
            other => Err(format!("unknown notification kind '{other}'")),
        }
    }
}

/// A persisted alarm.
///
/// The ABI and event names are held in structured form; they are parsed once
/// when the row is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Contract being watched.
    pub address: Address,
    /// Contract interface used to decode its logs.
    pub abi: JsonAbi,
    /// Event names to watch, in the order they were registered.
    pub event_names: Vec<String>,
    /// Delivery target for matches.
    pub notification_target: NotificationTarget,
    /// Minimum confirmations before a match is final for this alarm.
    pub block_confirmations: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Alarm {
    /// Returns true if the alarm watches the given event name.
    pub fn watches(&self, event_name: &str) -> bool {
        self.event_names.iter().any(|name| name == event_name)
    }
}

/// A validated alarm that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmDraft {
    /// Contract to watch.
    pub address: Address,
    /// Parsed contract interface.
    pub abi: JsonAbi,
    /// Event names, deduplicated, registration order kept.
    pub event_names: Vec<String>,
    /// Delivery target.
    pub notification_target: NotificationTarget,
    /// Per-alarm confirmation floor.
    pub block_confirmations: u64,
}

/// Restrictions applied when listing alarms. The default matches every alarm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmFilter {
    /// Only the alarm with this id.
    pub id: Option<i64>,
    /// Only alarms watching one of these addresses. Ignored when empty.
    pub addresses: Vec<Address>,
}

impl AlarmFilter {
    /// Filter on a single alarm id.
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Default::default() }
    }

    /// Filter on a set of addresses.
    pub fn by_addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self { addresses: addresses.into_iter().collect(), ..Default::default() }
    }
}

/// A contract and the interface used to decode its logs.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDescriptor {
    /// Contract address.
    pub address: Address,
    /// Interface shared by every alarm on the address.
    pub abi: JsonAbi,
}

/// An alarm description as submitted by a user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAlarm {
    /// Contract address as hex text.
    #[serde(default)]
    pub address: Option<String>,
    /// Either a JSON ABI array or a string containing one.
    #[serde(default)]
    pub abi: Option<serde_json::Value>,
    /// Events to watch.
    #[serde(default)]
    pub event_names: Vec<String>,
    /// Email recipient; exclusive with `webhook`.
    #[serde(default)]
    pub email: Option<String>,
    /// Webhook URL; exclusive with `email`.
    #[serde(default)]
    pub webhook: Option<String>,
    /// Confirmations required, zero when absent.
    #[serde(default)]
    pub block_confirmations: Option<u64>,
}
