//! Meme record persistence
//!
//! Each insert/update is an independent statement; nothing here spans
//! multiple records.

use chrono::{DateTime, Utc};
use memestash_common::db::{AnalysisStatus, MemeRecord};
use memestash_common::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::MemeAnalysis;

const SELECT_COLUMNS: &str = r#"
    SELECT guid, filename, filepath, text_content, description, tags, title,
           upload_time, file_hash, source_url, analysis_status, retry_count, last_retry_at
    FROM memes
"#;

/// Result of reserving a hash with a new record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another record already holds this content hash
    DuplicateHash,
}

/// Record counts per analysis status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub pending: i64,
}

/// Insert a new record, reserving its content hash
///
/// A UNIQUE violation on `file_hash` is reported as `DuplicateHash` rather
/// than an error; any other failure propagates.
pub async fn insert_pending(pool: &SqlitePool, record: &MemeRecord) -> Result<InsertOutcome> {
    let tags = encode_tags(&record.tags)?;

    let result = sqlx::query(
        r#"
        INSERT INTO memes (
            guid, filename, filepath, text_content, description, tags, title,
            upload_time, file_hash, source_url, analysis_status, retry_count, last_retry_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.guid.to_string())
    .bind(&record.filename)
    .bind(&record.filepath)
    .bind(&record.text_content)
    .bind(&record.description)
    .bind(&tags)
    .bind(&record.title)
    .bind(record.upload_time.to_rfc3339())
    .bind(&record.file_hash)
    .bind(&record.source_url)
    .bind(record.analysis_status.as_str())
    .bind(record.retry_count as i64)
    .bind(record.last_retry_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await;

    match result.map_err(Error::Database) {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(e) if e.is_unique_violation() && e.to_string().contains("file_hash") => {
            tracing::debug!(hash = %record.file_hash, "Insert rejected by file_hash constraint");
            Ok(InsertOutcome::DuplicateHash)
        }
        Err(e) => Err(e),
    }
}

/// Store the outcome of a record's first analysis attempt
pub async fn record_analysis(
    pool: &SqlitePool,
    guid: Uuid,
    analysis: &MemeAnalysis,
    status: AnalysisStatus,
) -> Result<()> {
    let tags = encode_tags(&analysis.tags)?;

    let result = sqlx::query(
        r#"
        UPDATE memes
        SET text_content = ?, description = ?, tags = ?, title = ?, analysis_status = ?
        WHERE guid = ?
        "#,
    )
    .bind(&analysis.text_content)
    .bind(&analysis.description)
    .bind(&tags)
    .bind(&analysis.title)
    .bind(status.as_str())
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Meme not found: {}", guid)));
    }
    Ok(())
}

/// Persist a record after a retry attempt
///
/// `retry_count` is written as `MAX(stored, new)` so a pipeline write never
/// lowers the counter.
pub async fn update_after_retry(pool: &SqlitePool, record: &MemeRecord) -> Result<()> {
    let tags = encode_tags(&record.tags)?;

    let result = sqlx::query(
        r#"
        UPDATE memes
        SET text_content = ?, description = ?, tags = ?, title = ?,
            analysis_status = ?,
            retry_count = MAX(retry_count, ?),
            last_retry_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&record.text_content)
    .bind(&record.description)
    .bind(&tags)
    .bind(&record.title)
    .bind(record.analysis_status.as_str())
    .bind(record.retry_count as i64)
    .bind(record.last_retry_at.map(|t| t.to_rfc3339()))
    .bind(record.guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Meme not found: {}", record.guid)));
    }
    Ok(())
}

/// Load record by content hash (for deduplication)
pub async fn find_by_hash(pool: &SqlitePool, hash: &str) -> Result<Option<MemeRecord>> {
    let query = format!("{} WHERE file_hash = ? LIMIT 1", SELECT_COLUMNS);
    let row = sqlx::query(&query)
        .bind(hash)
        .fetch_optional(pool)
        .await?;

    row.map(|r| row_to_record(&r)).transpose()
}

/// Load every failed record whose retry count is below `max_attempts`
pub async fn find_eligible_for_retry(
    pool: &SqlitePool,
    max_attempts: u32,
) -> Result<Vec<MemeRecord>> {
    let query = format!(
        "{} WHERE analysis_status = 'failed' AND retry_count < ? ORDER BY upload_time, guid",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&query)
        .bind(max_attempts as i64)
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_record).collect()
}

/// Load record by id
pub async fn load_meme(pool: &SqlitePool, guid: Uuid) -> Result<Option<MemeRecord>> {
    let query = format!("{} WHERE guid = ?", SELECT_COLUMNS);
    let row = sqlx::query(&query)
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| row_to_record(&r)).transpose()
}

/// Count records per analysis status
pub async fn count_by_status(pool: &SqlitePool) -> Result<StatusCounts> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT analysis_status, COUNT(*) FROM memes GROUP BY analysis_status")
            .fetch_all(pool)
            .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        match status.parse::<AnalysisStatus>()? {
            AnalysisStatus::Success => counts.success = count,
            AnalysisStatus::Failed => counts.failed = count,
            AnalysisStatus::Pending => counts.pending = count,
        }
        counts.total += count;
    }
    Ok(counts)
}

/// Delete a record (admin operation; the pipeline never deletes records)
///
/// Returns false when no record had this id.
pub async fn delete_meme(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM memes WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags)
        .map_err(|e| Error::Internal(format!("Failed to serialize tags: {}", e)))
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn row_to_record(row: &SqliteRow) -> Result<MemeRecord> {
    let guid_str: String = row.try_get("guid")?;
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?;

    let tags_json: String = row.try_get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| Error::Internal(format!("Failed to deserialize tags: {}", e)))?;

    let upload_time: String = row.try_get("upload_time")?;
    let last_retry_at: Option<String> = row.try_get("last_retry_at")?;
    let status: String = row.try_get("analysis_status")?;
    let retry_count: i64 = row.try_get("retry_count")?;

    Ok(MemeRecord {
        guid,
        filename: row.try_get("filename")?,
        filepath: row.try_get("filepath")?,
        text_content: row.try_get("text_content")?,
        description: row.try_get("description")?,
        tags,
        title: row.try_get("title")?,
        upload_time: parse_timestamp(&upload_time, "upload_time")?,
        file_hash: row.try_get("file_hash")?,
        source_url: row.try_get("source_url")?,
        analysis_status: status.parse()?,
        retry_count: retry_count.max(0) as u32,
        last_retry_at: last_retry_at
            .map(|s| parse_timestamp(&s, "last_retry_at"))
            .transpose()?,
    })
}
