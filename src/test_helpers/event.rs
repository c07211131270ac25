//! A builder for creating `ChainEvent` instances for testing.

use alloy::primitives::{Address, B256, address, b256};
use serde_json::json;

use crate::models::ChainEvent;

/// A builder for creating `ChainEvent` instances for testing.
#[derive(Debug, Clone)]
pub struct ChainEventBuilder {
    tx_hash: B256,
    address: Address,
    event_name: String,
    block_height: u64,
    log_index: Option<u64>,
    payload: serde_json::Value,
}

impl Default for ChainEventBuilder {
    fn default() -> Self {
        Self {
            tx_hash: b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
            address: address!("0x00000000000000000000000000000000000000aa"),
            event_name: "Transfer".to_string(),
            block_height: 0,
            log_index: None,
            payload: json!({}),
        }
    }
}

impl ChainEventBuilder {
    /// Creates a new `ChainEventBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transaction hash.
    pub fn tx_hash(mut self, tx_hash: B256) -> Self {
        self.tx_hash = tx_hash;
        self
    }

    /// Sets the emitting contract.
    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Sets the event name.
    pub fn event_name(mut self, name: &str) -> Self {
        self.event_name = name.to_string();
        self
    }

    /// Sets the block height.
    pub fn block_height(mut self, height: u64) -> Self {
        self.block_height = height;
        self
    }

    /// Sets the log index.
    pub fn log_index(mut self, index: u64) -> Self {
        self.log_index = Some(index);
        self
    }

    /// Sets the decoded payload.
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Builds the `ChainEvent`.
    pub fn build(self) -> ChainEvent {
        ChainEvent {
            tx_hash: self.tx_hash,
            address: self.address,
            event_name: self.event_name,
            block_height: self.block_height,
            log_index: self.log_index,
            payload: self.payload,
        }
    }
}
