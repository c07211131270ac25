//! Per-alarm synchronisation cursor.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::persistence::error::PersistenceError;

/// The highest block processed for an alarm. Never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    /// Owning alarm.
    pub alarm_id: i64,
    /// Highest block processed.
    pub last_sync_block: u64,
    /// Time of the last advance.
    pub updated_at: DateTime<Utc>,
}

/// An alarm's address joined with its cursor, if it has one yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmCursor {
    /// Alarm id.
    pub alarm_id: i64,
    /// Address the alarm watches.
    pub address: Address,
    /// `None` until the first sync height is recorded.
    pub last_sync_block: Option<u64>,
}

/// Result of recording a sync height for one alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRecord {
    /// Owning alarm.
    pub alarm_id: i64,
    /// The stored state after the write.
    pub sync_state: SyncState,
    /// True when this call created the state.
    pub was_created: bool,
}

/// Per-alarm outcome of a batch sync update.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Alarm the update was attempted for.
    pub alarm_id: i64,
    /// The record, or why the update failed.
    pub result: Result<SyncRecord, PersistenceError>,
}

impl SyncOutcome {
    /// True when the update succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
