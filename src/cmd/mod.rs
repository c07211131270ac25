//! Subcommands of the `alarmist` binary.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    abi::AbiFetchError,
    alarms::AlarmServiceError,
    config::AppConfig,
    http_client::HttpClientPoolError,
    persistence::{SqliteStateRepository, error::PersistenceError},
};

pub mod abi;
pub mod alarms;
pub mod reconcile;

/// Failures surfaced by a subcommand.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("{0}")]
    Alarm(#[from] AlarmServiceError),
    #[error("ABI lookup error: {0}")]
    AbiFetch(#[from] AbiFetchError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpClientPoolError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Connects to the configured database and brings its schema up to date.
pub async fn open_repository(
    config: &AppConfig,
) -> Result<Arc<SqliteStateRepository>, CommandError> {
    tracing::debug!(database_url = %config.database_url, "Initializing state repository...");
    let repository = SqliteStateRepository::new(&config.database_url).await?;
    repository.run_migrations().await?;
    Ok(Arc::new(repository))
}

/// Prints `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
