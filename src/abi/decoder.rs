//! Decoding of raw EVM logs into `ChainEvent`s.
//!
//! ABIs are only known at runtime (they come from alarm records), so decoding
//! goes through `dyn-abi` rather than the `sol!` macro.

use std::collections::HashMap;

use alloy::{
    dyn_abi::{self, EventExt},
    json_abi::Event,
    primitives::{Address, B256},
    rpc::types::Log,
};
use serde_json::{Map, Value};
use thiserror::Error;

use super::json::dyn_sol_value_to_json;
use crate::models::{ChainEvent, ContractDescriptor};

/// Reasons a log could not be turned into a `ChainEvent`.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No descriptor covers the emitting contract.
    #[error("No ABI registered for contract: {0}")]
    UnknownContract(Address),

    /// The log carries no selector topic.
    #[error("Log has no topics, cannot identify event")]
    LogHasNoTopics,

    /// The selector matches no event of the contract's ABI.
    #[error("Event signature not found in ABI: {0}")]
    EventNotFound(B256),

    /// Pending logs have no transaction hash yet.
    #[error("Log has no transaction hash")]
    MissingTransactionHash,

    /// Pending logs have no block number yet.
    #[error("Log has no block number")]
    MissingBlockNumber,

    /// Wrapper for decoding errors from the underlying ABI decoding library
    #[error("Failed to decode data: {0}")]
    Decoding(#[from] dyn_abi::Error),
}

/// Decodes logs of the contracts it was built with.
///
/// Events are indexed by selector per contract. Anonymous events have no
/// selector topic and are not decodable.
#[derive(Debug, Clone, Default)]
pub struct EventDecoder {
    contracts: HashMap<Address, HashMap<B256, Event>>,
}

impl EventDecoder {
    /// Builds a decoder for `descriptors`.
    pub fn new(descriptors: &[ContractDescriptor]) -> Self {
        let contracts = descriptors
            .iter()
            .map(|descriptor| {
                let events = descriptor
                    .abi
                    .events()
                    .filter(|event| !event.anonymous)
                    .map(|event| (event.selector(), event.clone()))
                    .collect::<HashMap<B256, Event>>();
                (descriptor.address, events)
            })
            .collect();
        Self { contracts }
    }

    /// True if logs from `address` can be decoded.
    pub fn is_known(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    /// Decodes one mined log.
    pub fn decode(&self, log: &Log) -> Result<ChainEvent, DecodeError> {
        let address = log.address();
        let events =
            self.contracts.get(&address).ok_or(DecodeError::UnknownContract(address))?;

        let selector = log.topics().first().ok_or(DecodeError::LogHasNoTopics)?;
        let event = events.get(selector).ok_or(DecodeError::EventNotFound(*selector))?;

        let tx_hash = log.transaction_hash.ok_or(DecodeError::MissingTransactionHash)?;
        let block_height = log.block_number.ok_or(DecodeError::MissingBlockNumber)?;

        let decoded = event.decode_log_parts(log.topics().iter().copied(), &log.data().data)?;

        // Indexed and body values come back separately; restore declaration order.
        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut payload = Map::new();
        for (position, input) in event.inputs.iter().enumerate() {
            let value = if input.indexed { indexed.next() } else { body.next() };
            let name =
                if input.name.is_empty() { format!("arg{position}") } else { input.name.clone() };
            let value = value.as_ref().map(dyn_sol_value_to_json).unwrap_or(Value::Null);
            payload.insert(name, value);
        }

        tracing::trace!(event = %event.name, %tx_hash, block_height, "Decoded log.");

        Ok(ChainEvent {
            tx_hash,
            address,
            event_name: event.name.clone(),
            block_height,
            log_index: log.log_index,
            payload: Value::Object(payload),
        })
    }

    /// Decodes every log it can, skipping the rest with a debug record.
    pub fn decode_all(&self, logs: &[Log]) -> Vec<ChainEvent> {
        logs.iter()
            .filter_map(|log| match self.decode(log) {
                Ok(event) => Some(event),
                Err(error) => {
                    tracing::debug!(error = %error, address = %log.address(), "Skipping log.");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Bytes, U256, address, b256};
    use serde_json::json;

    use super::*;
    use crate::test_helpers::{LogBuilder, erc20_abi};

    const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");
    const TX: B256 = b256!("0x4444444444444444444444444444444444444444444444444444444444444444");

    fn decoder() -> EventDecoder {
        EventDecoder::new(&[ContractDescriptor { address: TOKEN, abi: erc20_abi() }])
    }

    fn transfer_log() -> LogBuilder {
        LogBuilder::new()
            .address(TOKEN)
            .transaction_hash(TX)
            .block_number(12)
            .log_index(3)
            .erc20_transfer(
                address!("0x1111111111111111111111111111111111111111"),
                address!("0x2222222222222222222222222222222222222222"),
                U256::from(100u64),
            )
    }

    #[test]
    fn test_decode_known_event() {
        let event = decoder().decode(&transfer_log().build()).unwrap();

        assert_eq!(event.event_name, "Transfer");
        assert_eq!(event.address, TOKEN);
        assert_eq!(event.tx_hash, TX);
        assert_eq!(event.block_height, 12);
        assert_eq!(event.log_index, Some(3));
        assert_eq!(
            event.payload,
            json!({
                "from": "0x1111111111111111111111111111111111111111",
                "to": "0x2222222222222222222222222222222222222222",
                "value": 100
            })
        );
    }

    #[test]
    fn test_decode_unknown_contract() {
        let log = transfer_log().address(Address::ZERO).build();
        assert!(matches!(decoder().decode(&log), Err(DecodeError::UnknownContract(_))));
    }

    #[test]
    fn test_decode_unknown_selector() {
        let log = transfer_log().topics(vec![B256::ZERO]).build();
        assert!(matches!(decoder().decode(&log), Err(DecodeError::EventNotFound(_))));
    }

    #[test]
    fn test_decode_pending_log_is_rejected() {
        let log = LogBuilder::new()
            .address(TOKEN)
            .erc20_transfer(Address::ZERO, Address::ZERO, U256::ZERO)
            .build();
        assert!(matches!(decoder().decode(&log), Err(DecodeError::MissingTransactionHash)));
    }

    #[test]
    fn test_decode_all_skips_undecodable_logs() {
        let logs = vec![
            transfer_log().build(),
            transfer_log().data(Bytes::new()).build(),
            LogBuilder::new().address(TOKEN).build(),
        ];

        let events = decoder().decode_all(&logs);
        assert_eq!(events.len(), 1);
        assert!(decoder().is_known(&TOKEN));
    }
}
