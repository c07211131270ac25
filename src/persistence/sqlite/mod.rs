//! This module provides a concrete implementation of the alarm, sync state
//! and receipt repositories using SQLite.

use std::str::FromStr;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

pub mod alarm_repository;
pub mod receipt_repository;
pub mod sync_state_repository;

use crate::persistence::error::PersistenceError;

/// Pool size for file-backed databases.
const MAX_FILE_CONNECTIONS: u32 = 8;

/// A concrete implementation of the repositories using SQLite.
pub struct SqliteStateRepository {
    /// The SQLite connection pool used for database operations.
    pool: SqlitePool,
}

impl SqliteStateRepository {
    /// Creates a new instance of SqliteStateRepository with the provided
    /// database URL. This will create the database file if it does not
    /// exist.
    ///
    /// In-memory databases are private to a connection, so their pool is
    /// pinned to a single connection that is never recycled.
    #[tracing::instrument(level = "info")]
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        tracing::debug!(database_url, "Attempting to connect to SQLite database.");
        let in_memory = database_url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_FILE_CONNECTIONS)
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            PersistenceError::OperationFailed(format!("Failed to connect to database: {}", e))
        })?;
        tracing::info!(database_url, in_memory, "Successfully connected to SQLite database.");
        Ok(Self { pool })
    }

    /// Runs database migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Running database migrations.");
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run database migrations.");
            PersistenceError::MigrationError(e.to_string())
        })?;
        tracing::info!("Database migrations completed successfully.");
        Ok(())
    }

    /// Gets access to the underlying connection pool for advanced operations.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool gracefully.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn close(&self) {
        tracing::debug!("Closing SQLite connection pool.");
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed successfully.");
    }

    /// Helper to execute database queries with consistent error handling
    async fn execute_query_with_error_handling<F, T>(
        &self,
        operation: &str,
        query_fn: F,
    ) -> Result<T, PersistenceError>
    where
        F: std::future::Future<Output = Result<T, sqlx::Error>>,
    {
        query_fn.await.map_err(|e| {
            tracing::error!(error = %e, operation = %operation, "Database operation failed.");
            PersistenceError::OperationFailed(e.to_string())
        })
    }
}

/// Storage form of an address: lowercase `0x` hex.
pub(crate) fn address_key(address: &Address) -> String {
    format!("{address:#x}")
}

/// Storage form of a transaction hash: lowercase `0x` hex.
pub(crate) fn tx_hash_key(tx_hash: &B256) -> String {
    format!("{tx_hash:#x}")
}

pub(crate) fn parse_address(raw: &str) -> Result<Address, PersistenceError> {
    Address::from_str(raw)
        .map_err(|e| PersistenceError::SerializationError(format!("bad address '{raw}': {e}")))
}

pub(crate) fn parse_tx_hash(raw: &str) -> Result<B256, PersistenceError> {
    B256::from_str(raw)
        .map_err(|e| PersistenceError::SerializationError(format!("bad tx hash '{raw}': {e}")))
}

/// Block heights are `u64` in the domain and `INTEGER` (i64) in SQLite.
pub(crate) fn height_to_db(height: u64) -> Result<i64, PersistenceError> {
    i64::try_from(height).map_err(|error| {
        tracing::error!(error = %error, height, "Block height does not fit in an SQLite INTEGER.");
        PersistenceError::InvalidInput(error.to_string())
    })
}

pub(crate) fn height_from_db(height: i64) -> Result<u64, PersistenceError> {
    u64::try_from(height).map_err(|error| {
        tracing::error!(error = %error, height, "Stored block height is negative.");
        PersistenceError::SerializationError(error.to_string())
    })
}

pub(crate) fn utc(timestamp: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(timestamp, Utc)
}
