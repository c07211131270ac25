use crate::persistence::SqliteStateRepository;

/// Creates a migrated in-memory database.
pub async fn setup_test_db() -> SqliteStateRepository {
    let repo = SqliteStateRepository::new("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory db");
    repo.run_migrations().await.expect("Failed to run migrations");
    repo
}
