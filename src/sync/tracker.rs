//! Monotonic sync-height tracking.

use std::{collections::HashMap, sync::Arc};

use alloy::primitives::Address;
use futures::future::join_all;

use crate::{
    models::{AlarmFilter, SyncOutcome, SyncRecord},
    persistence::{
        error::PersistenceError,
        traits::{AlarmRepository, SyncStateRepository},
    },
};

/// Records how far each alarm has been synchronised.
///
/// Cursors only move forward: the store applies a write only when the new
/// height is strictly greater than the stored one.
pub struct SyncTracker<R: AlarmRepository + SyncStateRepository> {
    repository: Arc<R>,
}

impl<R: AlarmRepository + SyncStateRepository> SyncTracker<R> {
    /// Creates a new `SyncTracker` backed by `repository`.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Creates the alarm's cursor at `height`, or advances it when `height`
    /// is greater. Equal or lower heights are a successful no-op.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn record_sync_height(
        &self,
        alarm_id: i64,
        height: u64,
    ) -> Result<SyncRecord, PersistenceError> {
        self.repository.advance_sync_state(alarm_id, height).await
    }

    /// Records `height` for every alarm watching `address`.
    ///
    /// Each alarm gets its own outcome; one failing alarm does not stop the
    /// others. The outer error is only returned when the alarms themselves
    /// cannot be listed.
    #[tracing::instrument(skip(self), fields(address = %address), level = "debug")]
    pub async fn record_sync_heights_batch(
        &self,
        address: Address,
        height: u64,
    ) -> Result<Vec<SyncOutcome>, PersistenceError> {
        let alarms = self.repository.get_alarms(&AlarmFilter::by_addresses([address])).await?;

        let outcomes: Vec<SyncOutcome> = join_all(alarms.iter().map(|alarm| async move {
            SyncOutcome {
                alarm_id: alarm.id,
                result: self.repository.advance_sync_state(alarm.id, height).await,
            }
        }))
        .await;

        let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
        if failed > 0 {
            tracing::warn!(failed, total = outcomes.len(), "Some sync heights were not recorded.");
        }
        Ok(outcomes)
    }

    /// The watermark of each address: the highest `last_sync_block` among its
    /// alarms, counting an alarm without a cursor as `default_height`.
    ///
    /// Addresses without alarms are absent.
    #[tracing::instrument(skip(self, addresses), level = "debug")]
    pub async fn latest_synced_height_per_address(
        &self,
        addresses: &[Address],
        default_height: u64,
    ) -> Result<HashMap<Address, u64>, PersistenceError> {
        let cursors = self.repository.get_alarm_cursors(addresses).await?;

        let mut watermarks: HashMap<Address, u64> = HashMap::new();
        for cursor in cursors {
            let height = cursor.last_sync_block.unwrap_or(default_height);
            watermarks
                .entry(cursor.address)
                .and_modify(|current| *current = (*current).max(height))
                .or_insert(height);
        }
        Ok(watermarks)
    }
}
