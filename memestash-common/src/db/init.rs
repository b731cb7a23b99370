//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the `memes` table.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the status/search readers run alongside a pipeline write
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_memes_table(&pool).await?;

    Ok(pool)
}

/// Create the memes table
///
/// `file_hash` carries a UNIQUE constraint: a second insert of the same
/// content fails atomically even when two fetches pass the pre-check together.
pub async fn create_memes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memes (
            guid TEXT PRIMARY KEY,
            filename TEXT NOT NULL UNIQUE,
            filepath TEXT NOT NULL,
            text_content TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            title TEXT NOT NULL,
            upload_time TIMESTAMP NOT NULL,
            file_hash TEXT NOT NULL UNIQUE,
            source_url TEXT,
            analysis_status TEXT NOT NULL DEFAULT 'pending',
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_retry_at TIMESTAMP,
            CHECK (analysis_status IN ('pending', 'success', 'failed')),
            CHECK (retry_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_memes_status ON memes(analysis_status, retry_count)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_memes_upload_time ON memes(upload_time)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_database_creates_file_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("memes.db");

        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name = 'memes'",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["memes".to_string()]);
    }

    #[tokio::test]
    async fn test_create_memes_table_is_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        create_memes_table(&pool).await.unwrap();
        create_memes_table(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_hash_is_unique() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_memes_table(&pool).await.unwrap();

        let insert = |guid: &'static str, filename: &'static str| {
            sqlx::query(
                "INSERT INTO memes (guid, filename, filepath, description, title, upload_time, file_hash)
                 VALUES (?, ?, '/uploads/x', 'd', 't', '2024-01-01T00:00:00Z', 'samehash')",
            )
            .bind(guid)
            .bind(filename)
            .execute(&pool)
        };

        insert("a", "a.png").await.unwrap();
        let err = insert("b", "b.png").await.unwrap_err();
        let err = crate::Error::from(err);
        assert!(err.is_unique_violation());
    }
}
