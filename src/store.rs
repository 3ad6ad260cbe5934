//! SQLite metadata store for ingested sources.
//!
//! One row per source, keyed by `file_name`, holding the extracted text
//! snapshot alongside the upload time. The unique constraint on the key is
//! the final duplicate guard: a violation surfaces as
//! [`InsertOutcome::AlreadyExists`], not an error, so callers branch on the
//! outcome instead of catching failures.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::Result;
use crate::models::SourceRecord;

/// Result of recording a source in the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Open (creating if missing) the SQLite database at `db_path`.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create the schema. Idempotent; runs on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL UNIQUE,
            file_content TEXT NOT NULL,
            upload_time INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_upload_time ON documents(upload_time)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a source with its extracted text. Returns
/// [`InsertOutcome::AlreadyExists`] when the key is already present.
pub async fn insert(
    pool: &SqlitePool,
    file_name: &str,
    file_content: &str,
) -> Result<InsertOutcome> {
    let now = chrono::Utc::now().timestamp();

    let result =
        sqlx::query("INSERT INTO documents (file_name, file_content, upload_time) VALUES (?, ?, ?)")
            .bind(file_name)
            .bind(file_content)
            .bind(now)
            .execute(pool)
            .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(InsertOutcome::AlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}

/// Whether a source with this key has been recorded.
pub async fn exists(pool: &SqlitePool, file_name: &str) -> Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE file_name = ?")
        .bind(file_name)
        .fetch_one(pool)
        .await?;
    Ok(found)
}

/// Fetch one source record (metadata only) by key.
pub async fn get(pool: &SqlitePool, file_name: &str) -> Result<Option<SourceRecord>> {
    let row = sqlx::query("SELECT id, file_name, upload_time FROM documents WHERE file_name = ?")
        .bind(file_name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| SourceRecord {
        id: row.get("id"),
        file_name: row.get("file_name"),
        upload_time: row.get("upload_time"),
    }))
}

/// Fetch the extracted text snapshot stored for one source.
pub async fn get_content(pool: &SqlitePool, file_name: &str) -> Result<Option<String>> {
    let content: Option<String> =
        sqlx::query_scalar("SELECT file_content FROM documents WHERE file_name = ?")
            .bind(file_name)
            .fetch_optional(pool)
            .await?;
    Ok(content)
}

/// Remove a source row. Returns whether a row was actually deleted.
pub async fn delete(pool: &SqlitePool, file_name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM documents WHERE file_name = ?")
        .bind(file_name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// All recorded sources, oldest first. Ties on upload time fall back to
/// insertion order.
pub async fn list(pool: &SqlitePool) -> Result<Vec<SourceRecord>> {
    let rows =
        sqlx::query("SELECT id, file_name, upload_time FROM documents ORDER BY upload_time, id")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|row| SourceRecord {
            id: row.get("id"),
            file_name: row.get("file_name"),
            upload_time: row.get("upload_time"),
        })
        .collect())
}

/// Number of recorded sources.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Total stored snapshot text, in bytes. Used by `stats`.
pub async fn content_bytes(pool: &SqlitePool) -> Result<i64> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(LENGTH(CAST(file_content AS BLOB))), 0) FROM documents")
            .fetch_one(pool)
            .await?;
    Ok(total)
}

/// Delete every source row. Returns how many were removed.
pub async fn clear(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM documents").execute(pool).await?;
    Ok(result.rows_affected())
}
