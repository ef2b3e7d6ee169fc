// src/db/knowledge_card.rs
// Knowledge cards: the Synthesis Worker's per-session output, one card per
// session, replaced wholesale on each successful synthesis run.

use super::models::{Entity, KnowledgeCard, SynthesisStatus};
use crate::error::{Result, WaddleError};
use sqlx::{Row, SqlitePool};

fn row_to_card(row: sqlx::sqlite::SqliteRow) -> Result<KnowledgeCard> {
    let bullets: String = row.try_get("bullets")?;
    let entities: String = row.try_get("entities")?;
    let status: String = row.try_get("status")?;
    Ok(KnowledgeCard {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        title: row.try_get("title")?,
        bullets: serde_json::from_str(&bullets).unwrap_or_default(),
        entities: serde_json::from_str::<Vec<Entity>>(&entities).unwrap_or_default(),
        status: SynthesisStatus::parse(&status),
    })
}

/// Replace whatever card exists for `session_id` (there is at most one) with
/// a fresh one. Synthesis is idempotent: re-running it for the same session
/// overwrites rather than accumulates.
pub async fn upsert(
    pool: &SqlitePool,
    session_id: i64,
    title: &str,
    bullets: &[String],
    entities: &[Entity],
    status: SynthesisStatus,
) -> Result<KnowledgeCard> {
    let bullets_json = serde_json::to_string(bullets)?;
    let entities_json = serde_json::to_string(entities)?;

    sqlx::query("DELETE FROM knowledge_cards WHERE session_id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;

    let result = sqlx::query(
        "INSERT INTO knowledge_cards (session_id, title, bullets, entities, status) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(title)
    .bind(bullets_json)
    .bind(entities_json)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid()).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<KnowledgeCard> {
    let row = sqlx::query("SELECT * FROM knowledge_cards WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| WaddleError::not_found(format!("knowledge_card {id}")))?;
    row_to_card(row)
}

pub async fn get_for_session(pool: &SqlitePool, session_id: i64) -> Result<Option<KnowledgeCard>> {
    let row = sqlx::query("SELECT * FROM knowledge_cards WHERE session_id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;
    row.map(row_to_card).transpose()
}
