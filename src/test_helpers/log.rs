//! A builder for creating `Log` instances for testing.

use alloy::{
    primitives::{Address, B256, Bytes, LogData, U256},
    rpc::types::Log,
};

use super::erc20_abi;

/// A builder for creating `Log` instances for testing.
#[derive(Debug, Clone, Default)]
pub struct LogBuilder {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    transaction_hash: Option<B256>,
    block_number: Option<u64>,
    log_index: Option<u64>,
}

impl LogBuilder {
    /// Creates a new `LogBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address of the contract that emitted the log.
    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Adds a topic to the log.
    pub fn topic(mut self, topic: B256) -> Self {
        self.topics.push(topic);
        self
    }

    /// Sets the topics of the log.
    pub fn topics(mut self, topics: Vec<B256>) -> Self {
        self.topics = topics;
        self
    }

    /// Sets the data of the log.
    pub fn data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    /// Sets the transaction hash of the log.
    pub fn transaction_hash(mut self, hash: B256) -> Self {
        self.transaction_hash = Some(hash);
        self
    }

    /// Sets the block number of the log.
    pub fn block_number(mut self, number: u64) -> Self {
        self.block_number = Some(number);
        self
    }

    /// Sets the log index of the log.
    pub fn log_index(mut self, index: u64) -> Self {
        self.log_index = Some(index);
        self
    }

    /// Fills topics and data with an encoded ERC-20 `Transfer(from, to, value)`.
    pub fn erc20_transfer(mut self, from: Address, to: Address, value: U256) -> Self {
        let selector = erc20_abi().events["Transfer"][0].selector();
        self.topics = vec![selector, from.into_word(), to.into_word()];
        self.data = Bytes::from(value.to_be_bytes::<32>().to_vec());
        self
    }

    /// Builds the RPC `Log` with the provided values.
    pub fn build(self) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: self.address,
                data: LogData::new_unchecked(self.topics, self.data),
            },
            transaction_hash: self.transaction_hash,
            transaction_index: None,
            block_hash: None,
            block_number: self.block_number,
            log_index: self.log_index,
            removed: false,
            block_timestamp: None,
        }
    }
}
