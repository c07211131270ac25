//! Notification receipts.

use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Proof that an alarm was already notified about a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    /// Notified alarm.
    pub alarm_id: i64,
    /// Transaction the notification covered.
    pub tx_hash: B256,
    /// When the receipt was written.
    pub created_at: DateTime<Utc>,
}
