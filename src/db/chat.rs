// src/db/chat.rs
// Chat message CRUD: append-only per session, ciphertext content.

use super::models::{ChatMessageRow, ChatRole};
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> Result<ChatMessageRow> {
    let role: String = row.try_get("role")?;
    let timestamp: i64 = row.try_get("timestamp")?;
    Ok(ChatMessageRow {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: ChatRole::parse(&role)?,
        content: row.try_get("content")?,
        timestamp: DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now),
    })
}

pub async fn append(
    pool: &SqlitePool,
    session_id: i64,
    role: ChatRole,
    content: &[u8],
) -> Result<ChatMessageRow> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO chat_messages (session_id, role, content, timestamp) VALUES (?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(now.timestamp())
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT * FROM chat_messages WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await?;
    row_to_message(row)
}

pub async fn list_for_session(pool: &SqlitePool, session_id: i64) -> Result<Vec<ChatMessageRow>> {
    let rows = sqlx::query("SELECT * FROM chat_messages WHERE session_id = ? ORDER BY timestamp ASC, id ASC")
        .bind(session_id)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_message).collect()
}

pub async fn delete_for_session(pool: &SqlitePool, session_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Used by retention to decide whether a session bears user-authored content.
pub async fn count_for_session(pool: &SqlitePool, session_id: i64) -> Result<usize> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0 as usize)
}
