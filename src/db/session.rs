// src/db/session.rs
// Session CRUD. Ciphertext in, ciphertext out — encryption happens one layer
// up in the Storage Engine.

use super::models::{Entity, SessionRow, SynthesisStatus};
use crate::error::{Result, WaddleError};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

fn row_to_session(row: sqlx::sqlite::SqliteRow) -> Result<SessionRow> {
    let entities_json: String = row.try_get("entities_json")?;
    let ai_bullets: String = row.try_get("ai_bullets")?;
    let created_at: i64 = row.try_get("created_at")?;
    let updated_at: i64 = row.try_get("updated_at")?;
    let status: String = row.try_get("synthesis_status")?;

    Ok(SessionRow {
        id: row.try_get("id")?,
        date: row.try_get("date")?,
        custom_title: row.try_get("custom_title")?,
        custom_summary: row.try_get("custom_summary")?,
        original_summary: row.try_get("original_summary")?,
        extracted_text: row.try_get("extracted_text")?,
        entities_json: serde_json::from_str::<Vec<Entity>>(&entities_json).unwrap_or_default(),
        synthesis_status: SynthesisStatus::parse(&status),
        ai_summary: row.try_get("ai_summary")?,
        ai_bullets: serde_json::from_str(&ai_bullets).unwrap_or_default(),
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
    })
}

pub async fn create(pool: &SqlitePool, date: &str) -> Result<SessionRow> {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (date, extracted_text, entities_json, synthesis_status, ai_bullets, created_at, updated_at)
        VALUES (?, x'', '[]', 'pending', '[]', ?, ?)
        "#,
    )
    .bind(date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_by_id(pool, result.last_insert_rowid()).await
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<SessionRow> {
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| WaddleError::not_found(format!("session {id}")))?;
    row_to_session(row)
}

pub async fn get_by_date(pool: &SqlitePool, date: &str) -> Result<SessionRow> {
    let row = sqlx::query("SELECT * FROM sessions WHERE date = ?")
        .bind(date)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| WaddleError::not_found(format!("session for date {date}")))?;
    row_to_session(row)
}

pub async fn try_get_by_date(pool: &SqlitePool, date: &str) -> Result<Option<SessionRow>> {
    let row = sqlx::query("SELECT * FROM sessions WHERE date = ?")
        .bind(date)
        .fetch_optional(pool)
        .await?;
    row.map(row_to_session).transpose()
}

pub async fn update(pool: &SqlitePool, row: &SessionRow) -> Result<()> {
    let entities_json = serde_json::to_string(&row.entities_json)?;
    let ai_bullets = serde_json::to_string(&row.ai_bullets)?;
    sqlx::query(
        r#"
        UPDATE sessions SET
            custom_title = ?, custom_summary = ?, original_summary = ?,
            extracted_text = ?, entities_json = ?, synthesis_status = ?,
            ai_summary = ?, ai_bullets = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&row.custom_title)
    .bind(&row.custom_summary)
    .bind(&row.original_summary)
    .bind(&row.extracted_text)
    .bind(entities_json)
    .bind(row.synthesis_status.as_str())
    .bind(&row.ai_summary)
    .bind(ai_bullets)
    .bind(Utc::now().timestamp())
    .bind(row.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Set synthesis outputs; used by the Synthesis Worker. Does not disturb
/// `updated_at`'s semantics around user edits (it is still bumped, since the
/// row did change).
pub async fn update_synthesis(
    pool: &SqlitePool,
    id: i64,
    status: SynthesisStatus,
    entities: &[Entity],
    ai_bullets: &[String],
    ai_summary: Option<&str>,
) -> Result<()> {
    let entities_json = serde_json::to_string(entities)?;
    let bullets_json = serde_json::to_string(ai_bullets)?;
    sqlx::query(
        r#"
        UPDATE sessions SET
            synthesis_status = ?, entities_json = ?, ai_bullets = ?, ai_summary = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(entities_json)
    .bind(bullets_json)
    .bind(ai_summary)
    .bind(Utc::now().timestamp())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Sessions whose synthesis is pending, FIFO by `created_at`.
pub async fn list_pending_synthesis(pool: &SqlitePool) -> Result<Vec<SessionRow>> {
    let rows = sqlx::query("SELECT * FROM sessions WHERE synthesis_status = 'pending' ORDER BY created_at ASC, id ASC")
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_session).collect()
}

/// Deterministic, non-overlapping page of session dates ordered by descending
/// date. Pages partition the full result set: union over all pages in order
/// equals the unpaginated list.
pub async fn list_page(pool: &SqlitePool, page: usize, page_size: usize) -> Result<Vec<SessionRow>> {
    let offset = (page.saturating_sub(1)) * page_size;
    let rows = sqlx::query("SELECT * FROM sessions ORDER BY date DESC LIMIT ? OFFSET ?")
        .bind(page_size as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_session).collect()
}

pub async fn count(pool: &SqlitePool) -> Result<usize> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
        .fetch_one(pool)
        .await?;
    Ok(row.0 as usize)
}

pub async fn all_dates(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT date FROM sessions")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(d,)| d).collect())
}

/// All sessions, used by the vector rebuild path during corruption recovery.
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<SessionRow>> {
    let rows = sqlx::query("SELECT * FROM sessions ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_session).collect()
}

/// Sessions whose `date` (`YYYY-MM-DD`, lexically sortable) is older than
/// `cutoff_date`. Used by the Retention sweep.
pub async fn list_older_than(pool: &SqlitePool, cutoff_date: &str) -> Result<Vec<SessionRow>> {
    let rows = sqlx::query("SELECT * FROM sessions WHERE date < ? ORDER BY date ASC")
        .bind(cutoff_date)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_session).collect()
}
