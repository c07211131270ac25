//! Implementation of the SyncStateRepository trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{SqliteStateRepository, height_from_db, height_to_db, utc};
use crate::{
    models::{SyncRecord, SyncState},
    persistence::{error::PersistenceError, traits::SyncStateRepository},
};

/// SQL for the conditional cursor upsert.
mod sync_sql {
    /// Creates the cursor when the alarm has none yet.
    pub const INSERT_IF_ABSENT: &str = "INSERT INTO alarm_sync_states (alarm_id, last_sync_block) \
                                        VALUES (?, ?) ON CONFLICT (alarm_id) DO NOTHING";

    /// Compare-and-set: only moves the cursor forward.
    pub const ADVANCE_IF_GREATER: &str = "UPDATE alarm_sync_states \
                                          SET last_sync_block = ?, updated_at = CURRENT_TIMESTAMP \
                                          WHERE alarm_id = ? AND last_sync_block < ?";

    pub const SELECT_BY_ALARM: &str =
        "SELECT alarm_id, last_sync_block, updated_at FROM alarm_sync_states WHERE alarm_id = ?";
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct SyncStateRow {
    alarm_id: i64,
    last_sync_block: i64,
    updated_at: NaiveDateTime,
}

impl TryFrom<SyncStateRow> for SyncState {
    type Error = PersistenceError;

    fn try_from(row: SyncStateRow) -> Result<Self, Self::Error> {
        Ok(SyncState {
            alarm_id: row.alarm_id,
            last_sync_block: height_from_db(row.last_sync_block)?,
            updated_at: utc(row.updated_at),
        })
    }
}

/// Maps a write failure, reporting a missing parent alarm as `NotFound`.
fn map_write_error(alarm_id: i64, error: sqlx::Error) -> PersistenceError {
    let missing_alarm = error
        .as_database_error()
        .map(|db_error| db_error.is_foreign_key_violation())
        .unwrap_or(false);
    if missing_alarm {
        tracing::warn!(alarm_id, "Sync state write for unknown alarm.");
        PersistenceError::NotFound(format!("alarm {alarm_id}"))
    } else {
        tracing::error!(error = %error, alarm_id, "Sync state write failed.");
        PersistenceError::OperationFailed(error.to_string())
    }
}

#[async_trait]
impl SyncStateRepository for SqliteStateRepository {
    /// Retrieves the cursor of an alarm, if one exists.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_sync_state(&self, alarm_id: i64) -> Result<Option<SyncState>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "query sync state",
                sqlx::query_as::<_, SyncStateRow>(sync_sql::SELECT_BY_ALARM)
                    .bind(alarm_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(SyncState::try_from).transpose()
    }

    /// Find-or-create followed by a compare-and-set, in one transaction.
    ///
    /// Both writes are conditional, so interleaved calls can never move the
    /// cursor backwards.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn advance_sync_state(
        &self,
        alarm_id: i64,
        height: u64,
    ) -> Result<SyncRecord, PersistenceError> {
        let height_i64 = height_to_db(height)?;

        let mut tx = self.pool.begin().await.map_err(|e| map_write_error(alarm_id, e))?;

        let was_created = sqlx::query(sync_sql::INSERT_IF_ABSENT)
            .bind(alarm_id)
            .bind(height_i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(alarm_id, e))?
            .rows_affected()
            == 1;

        let advanced = if was_created {
            false
        } else {
            sqlx::query(sync_sql::ADVANCE_IF_GREATER)
                .bind(height_i64)
                .bind(alarm_id)
                .bind(height_i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_write_error(alarm_id, e))?
                .rows_affected()
                == 1
        };

        let row = sqlx::query_as::<_, SyncStateRow>(sync_sql::SELECT_BY_ALARM)
            .bind(alarm_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(alarm_id, e))?;

        tx.commit().await.map_err(|e| map_write_error(alarm_id, e))?;

        let sync_state = SyncState::try_from(row)?;
        if was_created || advanced {
            tracing::debug!(
                alarm_id,
                last_sync_block = sync_state.last_sync_block,
                was_created,
                "Sync state advanced."
            );
        } else {
            tracing::trace!(
                alarm_id,
                height,
                last_sync_block = sync_state.last_sync_block,
                "Sync height not above stored value, left unchanged."
            );
        }

        Ok(SyncRecord { alarm_id, sync_state, was_created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistence::traits::AlarmRepository,
        test_helpers::{AlarmDraftBuilder, setup_test_db},
    };

    #[tokio::test]
    async fn test_first_write_creates_state() {
        let repo = setup_test_db().await;
        let alarm = repo.insert_alarm(&AlarmDraftBuilder::new().build()).await.unwrap();

        assert!(repo.get_sync_state(alarm.id).await.unwrap().is_none());

        let record = repo.advance_sync_state(alarm.id, 10).await.unwrap();
        assert!(record.was_created);
        assert_eq!(record.sync_state.last_sync_block, 10);

        let stored = repo.get_sync_state(alarm.id).await.unwrap().unwrap();
        assert_eq!(stored.last_sync_block, 10);
    }

    #[tokio::test]
    async fn test_lower_and_equal_heights_are_no_ops() {
        let repo = setup_test_db().await;
        let alarm = repo.insert_alarm(&AlarmDraftBuilder::new().build()).await.unwrap();

        repo.advance_sync_state(alarm.id, 20).await.unwrap();

        let lower = repo.advance_sync_state(alarm.id, 5).await.unwrap();
        assert!(!lower.was_created);
        assert_eq!(lower.sync_state.last_sync_block, 20);

        let equal = repo.advance_sync_state(alarm.id, 20).await.unwrap();
        assert_eq!(equal.sync_state.last_sync_block, 20);

        let higher = repo.advance_sync_state(alarm.id, 21).await.unwrap();
        assert_eq!(higher.sync_state.last_sync_block, 21);
    }

    #[tokio::test]
    async fn test_unknown_alarm_is_not_found() {
        let repo = setup_test_db().await;
        let result = repo.advance_sync_state(999, 1).await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_height_beyond_sqlite_range_is_invalid() {
        let repo = setup_test_db().await;
        let alarm = repo.insert_alarm(&AlarmDraftBuilder::new().build()).await.unwrap();
        let result = repo.advance_sync_state(alarm.id, u64::MAX).await;
        assert!(matches!(result, Err(PersistenceError::InvalidInput(_))));
    }
}
