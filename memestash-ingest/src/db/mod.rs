//! Database access for memestash-ingest
//!
//! Record persistence for the pipeline. Table creation lives in
//! `memestash_common::db` so the search service opens the same schema.

pub mod memes;

use memestash_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool and ensure the memes table exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    memestash_common::db::init_database(db_path).await
}
