//! Notification receipts: the per-(alarm, transaction) dedup log.

use std::sync::Arc;

use alloy::primitives::B256;

use crate::{
    models::Receipt,
    persistence::{error::PersistenceError, traits::ReceiptRepository},
};

/// Records which (alarm, transaction) pairs were already notified.
pub struct ReceiptLedger<R: ReceiptRepository> {
    repository: Arc<R>,
}

impl<R: ReceiptRepository> ReceiptLedger<R> {
    /// Creates a new `ReceiptLedger` backed by `repository`.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// True if the pair was already notified.
    pub async fn has_receipt(
        &self,
        alarm_id: i64,
        tx_hash: &B256,
    ) -> Result<bool, PersistenceError> {
        self.repository.has_receipt(alarm_id, tx_hash).await
    }

    /// Marks the pair as notified. Returns false when it already was.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn record_receipt(
        &self,
        alarm_id: i64,
        tx_hash: &B256,
    ) -> Result<bool, PersistenceError> {
        let inserted = self.repository.insert_receipt(alarm_id, tx_hash).await?;
        if !inserted {
            tracing::warn!(alarm_id, %tx_hash, "Receipt already recorded for dispatched unit.");
        }
        Ok(inserted)
    }

    /// Every transaction the alarm was notified about, oldest first.
    pub async fn receipts_for(&self, alarm_id: i64) -> Result<Vec<Receipt>, PersistenceError> {
        self.repository.get_receipts(alarm_id).await
    }
}
