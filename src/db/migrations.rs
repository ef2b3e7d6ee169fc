// src/db/migrations.rs
// Monotonic migration list: (version, description, SQL), applied inside a
// transaction and recorded with a checksum in `schema_version`. This is a
// hand-rolled runner rather than `sqlx::migrate!` so each migration carries an
// explicit description and checksum, per spec §4.4.

use crate::error::{Result, WaddleError};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::info;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "sessions and activity tables",
        sql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                custom_title TEXT,
                custom_summary TEXT,
                original_summary TEXT,
                extracted_text BLOB NOT NULL DEFAULT x'',
                entities_json TEXT NOT NULL DEFAULT '[]',
                synthesis_status TEXT NOT NULL DEFAULT 'pending',
                ai_summary TEXT,
                ai_bullets TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS app_activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                app_name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(session_id, app_name)
            );

            CREATE TABLE IF NOT EXISTS activity_blocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                app_activity_id INTEGER NOT NULL REFERENCES app_activities(id) ON DELETE CASCADE,
                block_id TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                ocr_text BLOB NOT NULL DEFAULT x'',
                micro_summary TEXT,
                capture_source TEXT NOT NULL,
                structured_metadata TEXT NOT NULL DEFAULT '{}',
                UNIQUE(app_activity_id, block_id)
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content BLOB NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                notification_type TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                session_ref INTEGER REFERENCES sessions(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS manual_notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS knowledge_cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                bullets TEXT NOT NULL DEFAULT '[]',
                entities TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'pending'
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);
            CREATE INDEX IF NOT EXISTS idx_blocks_start ON activity_blocks(start_time);
        "#,
    },
    Migration {
        version: 2,
        description: "full-text search over non-encrypted session and block columns",
        sql: r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS sessions_fts USING fts5(
                date, custom_title, custom_summary, original_summary, ai_summary, entities_json,
                content='sessions', content_rowid='id'
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS blocks_fts USING fts5(
                micro_summary, structured_metadata,
                content='activity_blocks', content_rowid='id'
            );

            CREATE TRIGGER IF NOT EXISTS sessions_ai AFTER INSERT ON sessions BEGIN
                INSERT INTO sessions_fts(rowid, date, custom_title, custom_summary, original_summary, ai_summary, entities_json)
                VALUES (new.id, new.date, new.custom_title, new.custom_summary, new.original_summary, new.ai_summary, new.entities_json);
            END;

            CREATE TRIGGER IF NOT EXISTS sessions_ad AFTER DELETE ON sessions BEGIN
                INSERT INTO sessions_fts(sessions_fts, rowid, date, custom_title, custom_summary, original_summary, ai_summary, entities_json)
                VALUES ('delete', old.id, old.date, old.custom_title, old.custom_summary, old.original_summary, old.ai_summary, old.entities_json);
            END;

            CREATE TRIGGER IF NOT EXISTS sessions_au AFTER UPDATE ON sessions BEGIN
                INSERT INTO sessions_fts(sessions_fts, rowid, date, custom_title, custom_summary, original_summary, ai_summary, entities_json)
                VALUES ('delete', old.id, old.date, old.custom_title, old.custom_summary, old.original_summary, old.ai_summary, old.entities_json);
                INSERT INTO sessions_fts(rowid, date, custom_title, custom_summary, original_summary, ai_summary, entities_json)
                VALUES (new.id, new.date, new.custom_title, new.custom_summary, new.original_summary, new.ai_summary, new.entities_json);
            END;

            CREATE TRIGGER IF NOT EXISTS blocks_ai AFTER INSERT ON activity_blocks BEGIN
                INSERT INTO blocks_fts(rowid, micro_summary, structured_metadata)
                VALUES (new.id, new.micro_summary, new.structured_metadata);
            END;

            CREATE TRIGGER IF NOT EXISTS blocks_ad AFTER DELETE ON activity_blocks BEGIN
                INSERT INTO blocks_fts(blocks_fts, rowid, micro_summary, structured_metadata)
                VALUES ('delete', old.id, old.micro_summary, old.structured_metadata);
            END;

            CREATE TRIGGER IF NOT EXISTS blocks_au AFTER UPDATE ON activity_blocks BEGIN
                INSERT INTO blocks_fts(blocks_fts, rowid, micro_summary, structured_metadata)
                VALUES ('delete', old.id, old.micro_summary, old.structured_metadata);
                INSERT INTO blocks_fts(rowid, micro_summary, structured_metadata)
                VALUES (new.id, new.micro_summary, new.structured_metadata);
            END;
        "#,
    },
];

pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            checksum TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    for migration in MIGRATIONS {
        let checksum = checksum_of(migration.sql);
        let existing = sqlx::query("SELECT checksum FROM schema_version WHERE version = ?")
            .bind(migration.version)
            .fetch_optional(pool)
            .await?;

        match existing {
            Some(row) => {
                let stored: String = row.get("checksum");
                if stored != checksum {
                    return Err(WaddleError::Migration(format!(
                        "checksum mismatch for migration {}: stored={stored} computed={checksum}",
                        migration.version
                    )));
                }
            }
            None => {
                let mut tx = pool.begin().await?;
                sqlx::raw_sql(migration.sql)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        WaddleError::Migration(format!(
                            "migration {} ({}) failed: {e}",
                            migration.version, migration.description
                        ))
                    })?;
                sqlx::query(
                    "INSERT INTO schema_version (version, description, checksum, applied_at) VALUES (?, ?, ?, ?)",
                )
                .bind(migration.version)
                .bind(migration.description)
                .bind(&checksum)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                info!(version = migration.version, description = migration.description, "migration applied");
            }
        }
    }
    Ok(())
}

fn checksum_of(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Rebuild an empty schema from scratch, used by corruption recovery after a
/// relational file has been backed up and discarded.
pub async fn recreate_schema(pool: &SqlitePool) -> Result<()> {
    run(pool).await
}
