//! Storage interfaces consumed by the reconciliation core.
//!
//! Every mutation is atomic at the granularity of one record (one alarm, one
//! sync state, one receipt). No operation spans several records.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{Alarm, AlarmCursor, AlarmDraft, AlarmFilter, Receipt, SyncRecord, SyncState},
    persistence::error::PersistenceError,
};

/// Persistent alarm records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlarmRepository: Send + Sync {
    /// Retrieves the alarms matching `filter`, ordered by id.
    async fn get_alarms(&self, filter: &AlarmFilter) -> Result<Vec<Alarm>, PersistenceError>;

    /// Stores a validated alarm and returns it with its assigned id.
    async fn insert_alarm(&self, draft: &AlarmDraft) -> Result<Alarm, PersistenceError>;

    /// Retrieves every alarm watching one of `addresses` together with its
    /// sync cursor. An empty slice yields an empty result.
    async fn get_alarm_cursors(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<AlarmCursor>, PersistenceError>;
}

/// Persistent per-alarm sync cursors.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Retrieves the cursor of an alarm, if one exists.
    async fn get_sync_state(&self, alarm_id: i64) -> Result<Option<SyncState>, PersistenceError>;

    /// Creates the cursor at `height` if absent, otherwise moves it to `height`
    /// only when `height` is strictly greater than the stored value.
    async fn advance_sync_state(
        &self,
        alarm_id: i64,
        height: u64,
    ) -> Result<SyncRecord, PersistenceError>;
}

/// Persistent notification receipts keyed on `(alarm_id, tx_hash)`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Returns true if a receipt exists for the pair.
    async fn has_receipt(&self, alarm_id: i64, tx_hash: &B256) -> Result<bool, PersistenceError>;

    /// Writes a receipt. Returns false, without error, when it already existed.
    async fn insert_receipt(&self, alarm_id: i64, tx_hash: &B256)
    -> Result<bool, PersistenceError>;

    /// Lists the receipts of an alarm, oldest first.
    async fn get_receipts(&self, alarm_id: i64) -> Result<Vec<Receipt>, PersistenceError>;
}
