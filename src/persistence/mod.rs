//! Durable storage for alarms, their sync cursors and notification receipts.

pub mod error;
pub mod sqlite;
pub use sqlite::SqliteStateRepository;
pub mod traits;
