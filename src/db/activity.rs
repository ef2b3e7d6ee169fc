// src/db/activity.rs
// AppActivity and ActivityBlock CRUD. An AppActivity groups ActivityBlocks by
// (session, app name); blocks are the unit the Capture Pipeline writes.

use super::models::{ActivityBlockRow, AppActivity, CaptureSource};
use crate::error::{Result, WaddleError};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub async fn get_or_create_app_activity(
    pool: &SqlitePool,
    session_id: i64,
    app_name: &str,
) -> Result<AppActivity> {
    if let Some(row) = sqlx::query("SELECT * FROM app_activities WHERE session_id = ? AND app_name = ?")
        .bind(session_id)
        .bind(app_name)
        .fetch_optional(pool)
        .await?
    {
        return row_to_app_activity(row);
    }

    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "INSERT INTO app_activities (session_id, app_name, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(app_name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(r) => get_app_activity(pool, r.last_insert_rowid()).await,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            // Lost a race against a concurrent insert; re-read the winner.
            let row = sqlx::query("SELECT * FROM app_activities WHERE session_id = ? AND app_name = ?")
                .bind(session_id)
                .bind(app_name)
                .fetch_one(pool)
                .await?;
            row_to_app_activity(row)
        }
        Err(e) => Err(e.into()),
    }
}

async fn get_app_activity(pool: &SqlitePool, id: i64) -> Result<AppActivity> {
    let row = sqlx::query("SELECT * FROM app_activities WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| WaddleError::not_found(format!("app_activity {id}")))?;
    row_to_app_activity(row)
}

fn row_to_app_activity(row: sqlx::sqlite::SqliteRow) -> Result<AppActivity> {
    let created_at: i64 = row.try_get("created_at")?;
    let updated_at: i64 = row.try_get("updated_at")?;
    Ok(AppActivity {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        app_name: row.try_get("app_name")?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
    })
}

fn row_to_block(row: sqlx::sqlite::SqliteRow) -> Result<ActivityBlockRow> {
    let start: i64 = row.try_get("start_time")?;
    let end: i64 = row.try_get("end_time")?;
    let source: String = row.try_get("capture_source")?;
    let metadata: String = row.try_get("structured_metadata")?;
    Ok(ActivityBlockRow {
        id: row.try_get("id")?,
        app_activity_id: row.try_get("app_activity_id")?,
        block_id: row.try_get("block_id")?,
        start_time: DateTime::from_timestamp(start, 0).unwrap_or_else(Utc::now),
        end_time: DateTime::from_timestamp(end, 0).unwrap_or_else(Utc::now),
        ocr_text: row.try_get("ocr_text")?,
        micro_summary: row.try_get("micro_summary")?,
        capture_source: CaptureSource::parse(&source),
        structured_metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
    })
}

/// Insert a block, or update it in place if `(app_activity_id, block_id)`
/// already exists (the Capture Pipeline revises a block's end time/OCR text
/// as new focus events extend it).
pub async fn upsert_block(
    pool: &SqlitePool,
    app_activity_id: i64,
    block_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    ocr_text: &[u8],
    micro_summary: Option<&str>,
    capture_source: CaptureSource,
    structured_metadata: &serde_json::Value,
) -> Result<ActivityBlockRow> {
    let metadata_json = serde_json::to_string(structured_metadata)?;
    sqlx::query(
        r#"
        INSERT INTO activity_blocks
            (app_activity_id, block_id, start_time, end_time, ocr_text, micro_summary, capture_source, structured_metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(app_activity_id, block_id) DO UPDATE SET
            end_time = excluded.end_time,
            ocr_text = excluded.ocr_text,
            micro_summary = excluded.micro_summary,
            capture_source = excluded.capture_source,
            structured_metadata = excluded.structured_metadata
        "#,
    )
    .bind(app_activity_id)
    .bind(block_id)
    .bind(start_time.timestamp())
    .bind(end_time.timestamp())
    .bind(ocr_text)
    .bind(micro_summary)
    .bind(capture_source.as_str())
    .bind(metadata_json)
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT * FROM activity_blocks WHERE app_activity_id = ? AND block_id = ?")
        .bind(app_activity_id)
        .bind(block_id)
        .fetch_one(pool)
        .await?;
    row_to_block(row)
}

pub async fn find_app_activity(
    pool: &SqlitePool,
    session_id: i64,
    app_name: &str,
) -> Result<Option<AppActivity>> {
    let row = sqlx::query("SELECT * FROM app_activities WHERE session_id = ? AND app_name = ?")
        .bind(session_id)
        .bind(app_name)
        .fetch_optional(pool)
        .await?;
    row.map(row_to_app_activity).transpose()
}

/// Blocks for one app within a session, ordered by `start_time` ascending —
/// the order the Storage Engine's `get_activity_blocks` contract requires.
pub async fn list_blocks_for_app(
    pool: &SqlitePool,
    session_id: i64,
    app_name: &str,
) -> Result<Vec<ActivityBlockRow>> {
    let rows = sqlx::query(
        r#"
        SELECT b.* FROM activity_blocks b
        JOIN app_activities a ON a.id = b.app_activity_id
        WHERE a.session_id = ? AND a.app_name = ?
        ORDER BY b.start_time ASC
        "#,
    )
    .bind(session_id)
    .bind(app_name)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_block).collect()
}

pub async fn list_blocks_for_session(pool: &SqlitePool, session_id: i64) -> Result<Vec<ActivityBlockRow>> {
    let rows = sqlx::query(
        r#"
        SELECT b.* FROM activity_blocks b
        JOIN app_activities a ON a.id = b.app_activity_id
        WHERE a.session_id = ?
        ORDER BY b.start_time ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_block).collect()
}

pub async fn list_app_activities_for_session(pool: &SqlitePool, session_id: i64) -> Result<Vec<AppActivity>> {
    let rows = sqlx::query("SELECT * FROM app_activities WHERE session_id = ? ORDER BY app_name ASC")
        .bind(session_id)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_app_activity).collect()
}
