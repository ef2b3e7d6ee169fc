// src/db/mod.rs
// Transactional relational store: WAL-mode SQLite with foreign keys enforced,
// a 5s busy timeout, and a monotonic migration list. One operations module
// per entity (sessions, activity, chat, notes, cards, search).

pub mod activity;
pub mod chat;
pub mod knowledge_card;
pub mod manual_note;
pub mod migrations;
pub mod models;
pub mod notification;
pub mod search;
pub mod session;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Opens (creating if absent) the relational store at `path`, applies PRAGMAs,
/// and runs any pending migrations.
pub async fn open(path: &Path, busy_timeout: Duration) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .map_err(|e| crate::error::WaddleError::Database(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(busy_timeout)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    migrations::run(&pool).await?;
    info!(path = %path.display(), "relational store opened");
    Ok(pool)
}

/// Open an in-memory pool for tests; still runs migrations.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(&pool)
        .await?;
    migrations::run(&pool).await?;
    Ok(pool)
}

/// `PRAGMA integrity_check` used by the health probe.
pub async fn integrity_check(pool: &SqlitePool) -> Result<bool> {
    let row: (String,) = sqlx::query_as("PRAGMA integrity_check;")
        .fetch_one(pool)
        .await?;
    Ok(row.0 == "ok")
}
