//! Answer cache keyed by the exact question string.
//!
//! Expiry is lazy: entries older than the TTL are purged when they are next
//! read, never by a background sweep. A hit bumps `last_accessed` and
//! `usage_count` so the admin listing reflects real usage. Writes have
//! replace semantics: a new answer for a known question overwrites the old
//! entry and resets its accounting.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::CacheEntry;

/// Look up a cached answer. Returns `None` on miss or expiry; an expired
/// entry is deleted as part of the read.
pub async fn get(pool: &SqlitePool, ttl_secs: i64, question: &str) -> Result<Option<String>> {
    let question = question.trim();
    let row = sqlx::query("SELECT answer, created_at FROM answer_cache WHERE question = ? LIMIT 1")
        .bind(question)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let created_at: i64 = row.get("created_at");
    let now = chrono::Utc::now().timestamp();

    if now - created_at > ttl_secs {
        sqlx::query("DELETE FROM answer_cache WHERE question = ?")
            .bind(question)
            .execute(pool)
            .await?;
        return Ok(None);
    }

    sqlx::query(
        "UPDATE answer_cache SET last_accessed = ?, usage_count = usage_count + 1 WHERE question = ?",
    )
    .bind(now)
    .bind(question)
    .execute(pool)
    .await?;

    Ok(Some(row.get("answer")))
}

/// Store an answer, replacing any existing entry for the same question.
pub async fn put(pool: &SqlitePool, question: &str, answer: &str, source: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO answer_cache (question, answer, source, created_at, last_accessed, usage_count)
        VALUES (?, ?, ?, ?, ?, 1)
        ON CONFLICT(question) DO UPDATE SET
            answer = excluded.answer,
            source = excluded.source,
            created_at = excluded.created_at,
            last_accessed = excluded.last_accessed,
            usage_count = 1
        "#,
    )
    .bind(question.trim())
    .bind(answer)
    .bind(source)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop every cached answer. Called when the document corpus changes.
pub async fn clear(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM answer_cache").execute(pool).await?;
    Ok(())
}

/// All entries, most recently accessed first.
pub async fn list(pool: &SqlitePool) -> Result<Vec<CacheEntry>> {
    let rows = sqlx::query("SELECT * FROM answer_cache ORDER BY last_accessed DESC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| CacheEntry {
            id: row.get("id"),
            question: row.get("question"),
            answer: row.get("answer"),
            source: row.get("source"),
            created_at: row.get("created_at"),
            last_accessed: row.get("last_accessed"),
            usage_count: row.get("usage_count"),
        })
        .collect())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM answer_cache WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
