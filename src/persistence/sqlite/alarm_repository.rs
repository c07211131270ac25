//! Implementation of the AlarmRepository trait for SqliteStateRepository

use alloy::{json_abi::JsonAbi, primitives::Address};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{QueryBuilder, Sqlite};

use super::{
    SqliteStateRepository, address_key, height_from_db, height_to_db, parse_address, utc,
};
use crate::{
    models::{Alarm, AlarmCursor, AlarmDraft, AlarmFilter, NotificationTarget},
    persistence::{error::PersistenceError, traits::AlarmRepository},
};

const ALARM_COLUMNS: &str = "alarm_id, address, abi, event_names, notification_kind, \
                             notification_value, block_confirmations, created_at";

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct AlarmRow {
    alarm_id: i64,
    address: String,
    abi: String,
    event_names: String,
    notification_kind: String,
    notification_value: String,
    block_confirmations: i64,
    created_at: NaiveDateTime,
}

impl TryFrom<AlarmRow> for Alarm {
    type Error = PersistenceError;

    fn try_from(row: AlarmRow) -> Result<Self, Self::Error> {
        let abi: JsonAbi = serde_json::from_str(&row.abi).map_err(|e| {
            PersistenceError::SerializationError(format!("abi of alarm {}: {e}", row.alarm_id))
        })?;
        let event_names: Vec<String> = serde_json::from_str(&row.event_names).map_err(|e| {
            PersistenceError::SerializationError(format!(
                "event names of alarm {}: {e}",
                row.alarm_id
            ))
        })?;
        let notification_target =
            NotificationTarget::from_parts(&row.notification_kind, &row.notification_value)
                .map_err(PersistenceError::SerializationError)?;

        Ok(Alarm {
            id: row.alarm_id,
            address: parse_address(&row.address)?,
            abi,
            event_names,
            notification_target,
            block_confirmations: height_from_db(row.block_confirmations)?,
            created_at: utc(row.created_at),
        })
    }
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct AlarmCursorRow {
    alarm_id: i64,
    address: String,
    last_sync_block: Option<i64>,
}

fn push_address_list(builder: &mut QueryBuilder<'_, Sqlite>, addresses: &[Address]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for address in addresses {
        separated.push_bind(address_key(address));
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl AlarmRepository for SqliteStateRepository {
    /// Retrieves the alarms matching `filter`, ordered by id.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_alarms(&self, filter: &AlarmFilter) -> Result<Vec<Alarm>, PersistenceError> {
        tracing::debug!("Querying for alarms.");

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE 1 = 1"));
        if let Some(id) = filter.id {
            builder.push(" AND alarm_id = ").push_bind(id);
        }
        if !filter.addresses.is_empty() {
            builder.push(" AND address IN ");
            push_address_list(&mut builder, &filter.addresses);
        }
        builder.push(" ORDER BY alarm_id");

        let rows = self
            .execute_query_with_error_handling(
                "query alarms",
                builder.build_query_as::<AlarmRow>().fetch_all(&self.pool),
            )
            .await?;

        let alarms =
            rows.into_iter().map(Alarm::try_from).collect::<Result<Vec<_>, PersistenceError>>()?;

        tracing::debug!(alarm_count = alarms.len(), "Alarms retrieved successfully.");
        Ok(alarms)
    }

    /// Stores a validated alarm and returns it with its assigned id.
    #[tracing::instrument(skip(self, draft), fields(address = %draft.address), level = "debug")]
    async fn insert_alarm(&self, draft: &AlarmDraft) -> Result<Alarm, PersistenceError> {
        tracing::debug!("Attempting to insert alarm.");

        let abi = serde_json::to_string(&draft.abi)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let event_names = serde_json::to_string(&draft.event_names)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let block_confirmations = height_to_db(draft.block_confirmations)?;

        let sql = format!(
            "INSERT INTO alarms (address, abi, event_names, notification_kind, \
             notification_value, block_confirmations) VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {ALARM_COLUMNS}"
        );
        let row = self
            .execute_query_with_error_handling(
                "insert alarm",
                sqlx::query_as::<_, AlarmRow>(&sql)
                    .bind(address_key(&draft.address))
                    .bind(abi)
                    .bind(event_names)
                    .bind(draft.notification_target.kind())
                    .bind(draft.notification_target.value())
                    .bind(block_confirmations)
                    .fetch_one(&self.pool),
            )
            .await?;

        let alarm = Alarm::try_from(row)?;
        tracing::info!(alarm_id = alarm.id, address = %alarm.address, "Alarm stored.");
        Ok(alarm)
    }

    /// Retrieves the alarms watching `addresses` joined with their cursors.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_alarm_cursors(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<AlarmCursor>, PersistenceError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT a.alarm_id, a.address, s.last_sync_block FROM alarms a \
             LEFT JOIN alarm_sync_states s ON s.alarm_id = a.alarm_id WHERE a.address IN ",
        );
        push_address_list(&mut builder, addresses);
        builder.push(" ORDER BY a.alarm_id");

        let rows = self
            .execute_query_with_error_handling(
                "query alarm cursors",
                builder.build_query_as::<AlarmCursorRow>().fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(AlarmCursor {
                    alarm_id: row.alarm_id,
                    address: parse_address(&row.address)?,
                    last_sync_block: row.last_sync_block.map(height_from_db).transpose()?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::{
        persistence::traits::SyncStateRepository,
        test_helpers::{AlarmDraftBuilder, setup_test_db},
    };

    #[tokio::test]
    async fn test_insert_and_get_alarm_round_trip() {
        let repo = setup_test_db().await;
        let draft = AlarmDraftBuilder::new().event_names(&["Transfer", "Approval"]).build();

        let stored = repo.insert_alarm(&draft).await.unwrap();
        assert!(stored.id > 0);
        assert_eq!(stored.address, draft.address);
        assert_eq!(stored.abi, draft.abi);
        assert_eq!(stored.event_names, vec!["Transfer", "Approval"]);

        let fetched = repo.get_alarms(&AlarmFilter::by_id(stored.id)).await.unwrap();
        assert_eq!(fetched, vec![stored]);
    }

    #[tokio::test]
    async fn test_get_alarms_filters_combine() {
        let repo = setup_test_db().await;
        let token = address!("0x00000000000000000000000000000000000000aa");
        let other = address!("0x00000000000000000000000000000000000000bb");

        let first =
            repo.insert_alarm(&AlarmDraftBuilder::new().address(token).build()).await.unwrap();
        let second =
            repo.insert_alarm(&AlarmDraftBuilder::new().address(other).build()).await.unwrap();

        assert_eq!(repo.get_alarms(&AlarmFilter::default()).await.unwrap().len(), 2);

        let by_address = repo.get_alarms(&AlarmFilter::by_addresses([other])).await.unwrap();
        assert_eq!(by_address.len(), 1);
        assert_eq!(by_address[0].id, second.id);

        let mismatched = AlarmFilter { id: Some(first.id), addresses: vec![other] };
        assert!(repo.get_alarms(&mismatched).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_abi_surfaces_serialization_error() {
        let repo = setup_test_db().await;
        let stored = repo.insert_alarm(&AlarmDraftBuilder::new().build()).await.unwrap();

        sqlx::query("UPDATE alarms SET abi = 'not json' WHERE alarm_id = ?")
            .bind(stored.id)
            .execute(repo.pool())
            .await
            .unwrap();

        let result = repo.get_alarms(&AlarmFilter::default()).await;
        assert!(matches!(result, Err(PersistenceError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_get_alarm_cursors_joins_sync_state() {
        let repo = setup_test_db().await;
        let token = address!("0x00000000000000000000000000000000000000aa");
        let synced =
            repo.insert_alarm(&AlarmDraftBuilder::new().address(token).build()).await.unwrap();
        let fresh =
            repo.insert_alarm(&AlarmDraftBuilder::new().address(token).build()).await.unwrap();
        repo.advance_sync_state(synced.id, 77).await.unwrap();

        let cursors = repo.get_alarm_cursors(&[token]).await.unwrap();
        assert_eq!(cursors.len(), 2);
        assert_eq!(cursors[0].alarm_id, synced.id);
        assert_eq!(cursors[0].last_sync_block, Some(77));
        assert_eq!(cursors[1].alarm_id, fresh.id);
        assert_eq!(cursors[1].last_sync_block, None);

        assert!(repo.get_alarm_cursors(&[]).await.unwrap().is_empty());
    }
}
