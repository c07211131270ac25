//! Decoded on-chain events and their per-transaction grouping.

use std::collections::HashMap;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// A decoded log entry. Transient: events are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Transaction that emitted the log.
    pub tx_hash: B256,
    /// Contract that emitted the log.
    pub address: Address,
    /// Decoded event name.
    pub event_name: String,
    /// Block containing the transaction.
    pub block_height: u64,
    /// Position of the log in its block, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    /// Decoded event parameters.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// The events emitted by one transaction: one dispatch unit per alarm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventGroup {
    /// Shared transaction hash.
    pub tx_hash: B256,
    /// Events in input order.
    pub events: Vec<ChainEvent>,
}

impl EventGroup {
    /// Groups events by transaction hash, keeping first-seen order for both
    /// groups and the events within them.
    pub fn group_by_transaction(events: impl IntoIterator<Item = ChainEvent>) -> Vec<EventGroup> {
        let mut groups: Vec<EventGroup> = Vec::new();
        let mut index: HashMap<B256, usize> = HashMap::new();

        for event in events {
            match index.get(&event.tx_hash) {
                Some(&position) => groups[position].events.push(event),
                None => {
                    index.insert(event.tx_hash, groups.len());
                    groups.push(EventGroup { tx_hash: event.tx_hash, events: vec![event] });
                }
            }
        }

        groups
    }

    /// Height of the block holding the transaction. A transaction lives in a
    /// single block; the maximum is taken so a malformed batch is judged by its
    /// least final event.
    pub fn block_height(&self) -> u64 {
        self.events.iter().map(|event| event.block_height).max().unwrap_or_default()
    }

    /// Distinct contract addresses touched by the group, in first-seen order.
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = Vec::new();
        for event in &self.events {
            if !addresses.contains(&event.address) {
                addresses.push(event.address);
            }
        }
        addresses
    }

    /// The sub-group an alarm cares about: events from `address` whose name
    /// satisfies `watches`. `None` when nothing matches.
    pub fn select(&self, address: Address, watches: impl Fn(&str) -> bool) -> Option<EventGroup> {
        let events: Vec<ChainEvent> = self
            .events
            .iter()
            .filter(|event| event.address == address && watches(&event.event_name))
            .cloned()
            .collect();

        if events.is_empty() {
            None
        } else {
            Some(EventGroup { tx_hash: self.tx_hash, events })
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};
    use serde_json::json;

    use super::*;

    const TX_A: B256 = b256!("0x00000000000000000000000000000000000000000000000000000000000000aa");
    const TX_B: B256 = b256!("0x00000000000000000000000000000000000000000000000000000000000000bb");

    fn event(tx_hash: B256, contract: Address, name: &str, height: u64) -> ChainEvent {
        ChainEvent {
            tx_hash,
            address: contract,
            event_name: name.to_string(),
            block_height: height,
            log_index: None,
            payload: json!({}),
        }
    }

    #[test]
    fn test_group_by_transaction_keeps_first_seen_order() {
        let token = address!("0x00000000000000000000000000000000000000aa");
        let groups = EventGroup::group_by_transaction(vec![
            event(TX_B, token, "Transfer", 5),
            event(TX_A, token, "Approval", 6),
            event(TX_B, token, "Approval", 5),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].tx_hash, TX_B);
        assert_eq!(groups[0].events.len(), 2);
        assert_eq!(groups[0].events[1].event_name, "Approval");
        assert_eq!(groups[1].tx_hash, TX_A);
    }

    #[test]
    fn test_group_by_transaction_empty_input() {
        assert!(EventGroup::group_by_transaction(Vec::new()).is_empty());
    }

    #[test]
    fn test_select_filters_by_address_and_name() {
        let token = address!("0x00000000000000000000000000000000000000aa");
        let pool = address!("0x00000000000000000000000000000000000000bb");
        let group = EventGroup::group_by_transaction(vec![
            event(TX_A, token, "Transfer", 9),
            event(TX_A, pool, "Swap", 9),
            event(TX_A, token, "Approval", 9),
        ])
        .remove(0);

        assert_eq!(group.addresses(), vec![token, pool]);

        let transfers = group.select(token, |name| name == "Transfer").unwrap();
        assert_eq!(transfers.events.len(), 1);
        assert_eq!(transfers.block_height(), 9);

        assert!(group.select(pool, |name| name == "Transfer").is_none());
    }

    #[test]
    fn test_chain_event_json_shape() {
        let raw = json!({
            "tx_hash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "address": "0x00000000000000000000000000000000000000aa",
            "event_name": "Transfer",
            "block_height": 8,
            "payload": {"value": "10"}
        });
        let parsed: ChainEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.tx_hash, TX_A);
        assert_eq!(parsed.block_height, 8);
        assert!(parsed.log_index.is_none());
    }
}
