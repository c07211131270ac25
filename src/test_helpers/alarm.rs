//! A builder for creating `AlarmDraft` instances for testing.

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, address},
};
use url::Url;

use super::erc20_abi;
use crate::models::{AlarmDraft, NotificationTarget};

/// A builder for creating `AlarmDraft` instances for testing.
///
/// Defaults to an alarm on `0x…aa` watching ERC-20 `Transfer` events and
/// notifying a webhook.
#[derive(Debug, Clone)]
pub struct AlarmDraftBuilder {
    address: Address,
    abi: JsonAbi,
    event_names: Vec<String>,
    notification_target: NotificationTarget,
    block_confirmations: u64,
}

impl Default for AlarmDraftBuilder {
    fn default() -> Self {
        Self {
            address: address!("0x00000000000000000000000000000000000000aa"),
            abi: erc20_abi(),
            event_names: vec!["Transfer".to_string()],
            notification_target: NotificationTarget::Webhook(
                Url::parse("https://hooks.example.com/alarm").expect("valid url"),
            ),
            block_confirmations: 0,
        }
    }
}

impl AlarmDraftBuilder {
    /// Creates a new `AlarmDraftBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the watched address.
    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Sets the watched event names.
    pub fn event_names(mut self, names: &[&str]) -> Self {
        self.event_names = names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Sets the contract ABI.
    pub fn abi(mut self, abi: JsonAbi) -> Self {
        self.abi = abi;
        self
    }

    /// Sets the notification target.
    pub fn target(mut self, target: NotificationTarget) -> Self {
        self.notification_target = target;
        self
    }

    /// Sets the per-alarm confirmation floor.
    pub fn confirmations(mut self, confirmations: u64) -> Self {
        self.block_confirmations = confirmations;
        self
    }

    /// Builds the `AlarmDraft`.
    pub fn build(self) -> AlarmDraft {
        AlarmDraft {
            address: self.address,
            abi: self.abi,
            event_names: self.event_names,
            notification_target: self.notification_target,
            block_confirmations: self.block_confirmations,
        }
    }
}
