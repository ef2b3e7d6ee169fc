// src/db/manual_note.rs
// User-authored notes attached to a session. Counted toward
// "user-authored-content" when the Retention module decides whether a session
// is eligible for deletion.

use super::models::ManualNote;
use crate::error::{Result, WaddleError};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

fn row_to_note(row: sqlx::sqlite::SqliteRow) -> Result<ManualNote> {
    let created_at: i64 = row.try_get("created_at")?;
    let updated_at: i64 = row.try_get("updated_at")?;
    Ok(ManualNote {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        content: row.try_get("content")?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
    })
}

pub async fn create(pool: &SqlitePool, session_id: i64, content: &str) -> Result<ManualNote> {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "INSERT INTO manual_notes (session_id, content, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid()).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<ManualNote> {
    let row = sqlx::query("SELECT * FROM manual_notes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| WaddleError::not_found(format!("manual_note {id}")))?;
    row_to_note(row)
}

pub async fn update(pool: &SqlitePool, id: i64, content: &str) -> Result<ManualNote> {
    sqlx::query("UPDATE manual_notes SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM manual_notes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_for_session(pool: &SqlitePool, session_id: i64) -> Result<Vec<ManualNote>> {
    let rows = sqlx::query("SELECT * FROM manual_notes WHERE session_id = ? ORDER BY created_at ASC")
        .bind(session_id)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_note).collect()
}

pub async fn count_for_session(pool: &SqlitePool, session_id: i64) -> Result<usize> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM manual_notes WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0 as usize)
}
