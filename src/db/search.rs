// src/db/search.rs
// Full-text search over the non-encrypted session columns (title, summaries,
// entities) via `sessions_fts`, unioned with block-level matches (micro
// summary, structured metadata) via `blocks_fts`. `extracted_text` and
// `ocr_text` are ciphertext and are therefore outside the FTS index —
// callers that need them decrypt through the Storage Engine after this
// module hands back rows.

use super::models::{Entity, SessionRow, SynthesisStatus};
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// One full-text match: the underlying row, a relevance rank (lower is
/// better, per SQLite FTS5's `bm25()`), and a generated snippet.
pub struct SearchMatch {
    pub row: SessionRow,
    pub rank: f64,
    pub snippet: String,
}

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

/// FTS5 query syntax is user-hostile (bare `"` or `-` raise syntax errors);
/// wrap each whitespace-separated term in quotes and OR them together so any
/// input string is a valid MATCH argument.
fn sanitize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

pub async fn search_sessions(
    pool: &SqlitePool,
    query: &str,
    page: usize,
    page_size: usize,
) -> Result<(Vec<SearchMatch>, usize)> {
    let fts_query = sanitize_query(query);
    if fts_query.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let session_hits = sqlx::query(
        r#"
        SELECT sessions_fts.rowid AS session_id, bm25(sessions_fts) AS rank,
               snippet(sessions_fts, -1, '[', ']', '...', 12) AS snippet
        FROM sessions_fts
        WHERE sessions_fts MATCH ?
        "#,
    )
    .bind(&fts_query)
    .fetch_all(pool)
    .await?;

    let block_hits = sqlx::query(
        r#"
        SELECT aa.session_id AS session_id, bm25(blocks_fts) AS rank,
               snippet(blocks_fts, -1, '[', ']', '...', 12) AS snippet
        FROM blocks_fts
        JOIN activity_blocks ab ON ab.id = blocks_fts.rowid
        JOIN app_activities aa ON aa.id = ab.app_activity_id
        WHERE blocks_fts MATCH ?
        "#,
    )
    .bind(&fts_query)
    .fetch_all(pool)
    .await?;

    // A session can match through its own columns, its blocks, or both; keep
    // whichever hit ranks best (bm25 is lower-is-better) as the session's
    // representative rank and snippet.
    let mut best: HashMap<i64, (f64, String)> = HashMap::new();
    for row in session_hits.iter().chain(block_hits.iter()) {
        let session_id: i64 = row.try_get("session_id")?;
        let rank: f64 = row.try_get("rank")?;
        let snippet: String = row.try_get("snippet")?;
        best.entry(session_id)
            .and_modify(|(best_rank, best_snippet)| {
                if rank < *best_rank {
                    *best_rank = rank;
                    *best_snippet = snippet.clone();
                }
            })
            .or_insert((rank, snippet));
    }

    let mut ranked: Vec<(i64, f64, String)> =
        best.into_iter().map(|(id, (rank, snippet))| (id, rank, snippet)).collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let total = ranked.len();
    let offset = (page.saturating_sub(1)) * page_size;

    let mut matches = Vec::with_capacity(page_size.min(total));
    for (session_id, rank, snippet) in ranked.into_iter().skip(offset).take(page_size) {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
        matches.push(SearchMatch {
            row: row_to_session(row)?,
            rank,
            snippet,
        });
    }
    Ok((matches, total))
}
