//! Document registry client.
//!
//! Thin data-access layer over the `documents` table. The indexing pipeline
//! reads candidate records from here and writes status transitions back;
//! the admin surface lists records and aggregates counts.
//!
//! Registry unavailability (any query error) is fatal to an indexing run and
//! is propagated to the caller rather than swallowed.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::{DocumentRecord, DocumentStats, DocumentStatus};

/// Register a stored file as a new PENDING document. Returns the record id.
pub async fn register_document(
    pool: &SqlitePool,
    file_name: &str,
    original_name: &str,
    file_path: &str,
) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        r#"
        INSERT INTO documents (file_name, original_name, file_path, status, upload_timestamp)
        VALUES (?, ?, ?, 'PENDING', ?)
        "#,
    )
    .bind(file_name)
    .bind(original_name)
    .bind(file_path)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Documents awaiting indexing (incremental mode candidates).
pub async fn list_pending(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
    let rows = sqlx::query("SELECT * FROM documents WHERE status = 'PENDING' ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(record_from_row).collect())
}

/// Every registered document (rebuild mode candidates).
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
    let rows = sqlx::query("SELECT * FROM documents ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(record_from_row).collect())
}

/// Admin listing, newest upload first.
pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
    let rows = sqlx::query("SELECT * FROM documents ORDER BY upload_timestamp DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(record_from_row).collect())
}

/// Transition a record's status without touching the indexed timestamp.
pub async fn update_status(pool: &SqlitePool, id: i64, status: DocumentStatus) -> Result<()> {
    sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Transition a record to INDEXED and stamp the indexing time.
pub async fn mark_indexed(pool: &SqlitePool, id: i64) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE documents SET status = 'INDEXED', last_indexed_timestamp = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a record. The caller is responsible for removing the stored file.
pub async fn delete_document(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_document(pool: &SqlitePool, id: i64) -> Result<Option<DocumentRecord>> {
    let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(record_from_row))
}

/// Per-status counts for the admin dashboard.
pub async fn document_stats(pool: &SqlitePool) -> Result<DocumentStats> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            SUM(status = 'INDEXED') AS indexed,
            SUM(status = 'PENDING') AS pending,
            SUM(status LIKE 'ERROR%' OR status = 'UNSUPPORTED') AS failed
        FROM documents
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DocumentStats {
        total: row.get::<i64, _>("total"),
        indexed: row.get::<Option<i64>, _>("indexed").unwrap_or(0),
        pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
        failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
    })
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    DocumentRecord {
        id: row.get("id"),
        file_name: row.get("file_name"),
        original_name: row.get("original_name"),
        file_path: row.get("file_path"),
        status: row.get("status"),
        upload_timestamp: row.get("upload_timestamp"),
        last_indexed_timestamp: row.get("last_indexed_timestamp"),
    }
}
