// src/db/notification.rs
// Notification inbox: UUID-keyed, read/unread, optionally tied to a session.

use super::models::Notification;
use crate::error::{Result, WaddleError};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

fn row_to_notification(row: sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let timestamp: i64 = row.try_get("timestamp")?;
    let read: i64 = row.try_get("read")?;
    Ok(Notification {
        id: row.try_get("id")?,
        notification_type: row.try_get("notification_type")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        timestamp: DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now),
        read: read != 0,
        session_ref: row.try_get("session_ref")?,
    })
}

pub async fn create(
    pool: &SqlitePool,
    notification_type: &str,
    title: &str,
    message: &str,
    session_ref: Option<i64>,
) -> Result<Notification> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO notifications (id, notification_type, title, message, timestamp, read, session_ref)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(notification_type)
    .bind(title)
    .bind(message)
    .bind(now.timestamp())
    .bind(session_ref)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Notification> {
    let row = sqlx::query("SELECT * FROM notifications WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| WaddleError::not_found(format!("notification {id}")))?;
    row_to_notification(row)
}

pub async fn mark_read(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_unread(pool: &SqlitePool) -> Result<Vec<Notification>> {
    let rows = sqlx::query("SELECT * FROM notifications WHERE read = 0 ORDER BY timestamp DESC")
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_notification).collect()
}

pub async fn list_recent(pool: &SqlitePool, limit: usize) -> Result<Vec<Notification>> {
    let rows = sqlx::query("SELECT * FROM notifications ORDER BY timestamp DESC LIMIT ?")
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_notification).collect()
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM notifications WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
