//! Implementation of the ReceiptRepository trait for SqliteStateRepository

use alloy::primitives::B256;
use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{SqliteStateRepository, parse_tx_hash, tx_hash_key, utc};
use crate::{
    models::Receipt,
    persistence::{error::PersistenceError, traits::ReceiptRepository},
};

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct ReceiptRow {
    alarm_id: i64,
    tx_hash: String,
    created_at: NaiveDateTime,
}

#[async_trait]
impl ReceiptRepository for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn has_receipt(&self, alarm_id: i64, tx_hash: &B256) -> Result<bool, PersistenceError> {
        let found: Option<(i64,)> = self
            .execute_query_with_error_handling(
                "query receipt",
                sqlx::query_as("SELECT 1 FROM alarm_receipts WHERE alarm_id = ? AND tx_hash = ?")
                    .bind(alarm_id)
                    .bind(tx_hash_key(tx_hash))
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(found.is_some())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn insert_receipt(
        &self,
        alarm_id: i64,
        tx_hash: &B256,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "insert receipt",
                sqlx::query(
                    "INSERT INTO alarm_receipts (alarm_id, tx_hash) VALUES (?, ?) \
                     ON CONFLICT (alarm_id, tx_hash) DO NOTHING",
                )
                .bind(alarm_id)
                .bind(tx_hash_key(tx_hash))
                .execute(&self.pool),
            )
            .await?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            tracing::debug!(alarm_id, %tx_hash, "Receipt already present.");
        }
        Ok(inserted)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_receipts(&self, alarm_id: i64) -> Result<Vec<Receipt>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "query receipts",
                sqlx::query_as::<_, ReceiptRow>(
                    "SELECT alarm_id, tx_hash, created_at FROM alarm_receipts \
                     WHERE alarm_id = ? ORDER BY created_at, tx_hash",
                )
                .bind(alarm_id)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Receipt {
                    alarm_id: row.alarm_id,
                    tx_hash: parse_tx_hash(&row.tx_hash)?,
                    created_at: utc(row.created_at),
                })
            })
            .collect()
    }
}
