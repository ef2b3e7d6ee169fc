// src/storage/engine.rs
// Façade coordinating the Keystore, Relational Store, Vector Index, and Blob
// Store for every external read/write. Nothing outside this module crosses
// the encryption boundary directly.

use super::embedder::Embedder;
use crate::blob::BlobStore;
use crate::crypto::Keystore;
use crate::db::models::{
    ActivityBlock, AppActivity, CaptureSource, ChatMessage, ChatRole, Entity, KnowledgeCard,
    ManualNote, Notification, Page, SearchHit, Session, SynthesisStatus,
};
use crate::db::{self, activity, chat, knowledge_card, manual_note, notification, search, session};
use crate::error::{Result, WaddleError};
use crate::vector::{VectorBatcher, VectorIndex};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct StoreHealth {
    pub status: StoreStatus,
    pub latency_ms: u64,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub relational: StoreHealth,
    pub vector: StoreHealth,
    pub blob: StoreHealth,
    pub aggregate: StoreStatus,
    pub missed_embedding_refresh: u64,
}

pub struct StorageEngine {
    pool: SqlitePool,
    keystore: Keystore,
    vector: Arc<VectorIndex>,
    batcher: Arc<VectorBatcher>,
    blob: BlobStore,
    embedder: Arc<dyn Embedder>,
    data_dir: PathBuf,
    paused: AtomicBool,
    resume_notify: Notify,
    missed_embedding_refresh: AtomicU64,
}

impl StorageEngine {
    pub fn new(
        pool: SqlitePool,
        keystore: Keystore,
        vector: Arc<VectorIndex>,
        batcher: Arc<VectorBatcher>,
        blob: BlobStore,
        embedder: Arc<dyn Embedder>,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            keystore,
            vector,
            batcher,
            blob,
            embedder,
            data_dir,
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            missed_embedding_refresh: AtomicU64::new(0),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn vector(&self) -> &Arc<VectorIndex> {
        &self.vector
    }

    pub fn blob(&self) -> &BlobStore {
        &self.blob
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn missed_embedding_refresh_count(&self) -> u64 {
        self.missed_embedding_refresh.load(Ordering::Relaxed)
    }

    /// Stop accepting new writes from the Capture Pipeline. Used by backup and
    /// restore to get a consistent snapshot window.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("storage engine paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
        info!("storage engine resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Called by the Capture Pipeline's ingest stage before any write; blocks
    /// while the engine is paused for a backup/restore window.
    pub async fn wait_until_resumed(&self) {
        while self.is_paused() {
            self.resume_notify.notified().await;
        }
    }

    fn decrypt_text(&self, ciphertext: &[u8]) -> Result<String> {
        let bytes = self.keystore.decrypt(ciphertext)?;
        String::from_utf8(bytes).map_err(|e| WaddleError::Serialization(format!("utf8: {e}")))
    }

    fn encrypt_text(&self, plaintext: &str) -> Result<Vec<u8>> {
        self.keystore.encrypt(plaintext.as_bytes())
    }

    fn hydrate_session(&self, row: db::models::SessionRow) -> Result<Session> {
        Ok(Session {
            id: row.id,
            date: row.date,
            custom_title: row.custom_title,
            custom_summary: row.custom_summary,
            original_summary: row.original_summary,
            extracted_text: self.decrypt_text(&row.extracted_text)?,
            entities_json: row.entities_json,
            synthesis_status: row.synthesis_status,
            ai_summary: row.ai_summary,
            ai_bullets: row.ai_bullets,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn hydrate_block(&self, row: db::models::ActivityBlockRow) -> Result<ActivityBlock> {
        Ok(ActivityBlock {
            id: row.id,
            app_activity_id: row.app_activity_id,
            block_id: row.block_id,
            start_time: row.start_time,
            end_time: row.end_time,
            ocr_text: self.decrypt_text(&row.ocr_text)?,
            micro_summary: row.micro_summary,
            capture_source: row.capture_source,
            structured_metadata: row.structured_metadata,
        })
    }

    fn hydrate_chat(&self, row: db::models::ChatMessageRow) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: row.id,
            session_id: row.session_id,
            role: row.role,
            content: self.decrypt_text(&row.content)?,
            timestamp: row.timestamp,
        })
    }

    #[instrument(skip(self))]
    pub async fn create_session(&self, date: &str) -> Result<Session> {
        let row = session::create(&self.pool, date).await?;
        self.hydrate_session(row)
    }

    #[instrument(skip(self))]
    pub async fn get_session(&self, date: &str) -> Result<Session> {
        let row = session::get_by_date(&self.pool, date).await?;
        self.hydrate_session(row)
    }

    #[instrument(skip(self))]
    pub async fn get_session_by_id(&self, id: i64) -> Result<Session> {
        let row = session::get_by_id(&self.pool, id).await?;
        self.hydrate_session(row)
    }

    /// Sessions awaiting synthesis, FIFO by `created_at` — consumed by the
    /// Synthesis Worker.
    pub async fn list_pending_synthesis(&self) -> Result<Vec<Session>> {
        let rows = session::list_pending_synthesis(&self.pool).await?;
        rows.into_iter().map(|r| self.hydrate_session(r)).collect()
    }

    /// Create-if-absent, used by the Capture Pipeline's Stage-1 ingest.
    /// `Conflict` from a racing create is swallowed.
    #[instrument(skip(self))]
    pub async fn ensure_session(&self, date: &str) -> Result<Session> {
        if let Some(row) = session::try_get_by_date(&self.pool, date).await? {
            return self.hydrate_session(row);
        }
        match session::create(&self.pool, date).await {
            Ok(row) => self.hydrate_session(row),
            Err(WaddleError::Conflict(_)) => self.get_session(date).await,
            Err(e) => Err(e),
        }
    }

    /// Persist a full Session. Enqueues an embedding refresh when
    /// `extracted_text` changed; enqueue failures are logged and counted, not
    /// propagated.
    #[instrument(skip(self, session))]
    pub async fn update_session(&self, sess: &Session) -> Result<()> {
        let previous = session::get_by_id(&self.pool, sess.id).await?;
        let previous_text = self.decrypt_text(&previous.extracted_text)?;
        let text_changed = previous_text != sess.extracted_text;

        let row = db::models::SessionRow {
            id: sess.id,
            date: sess.date.clone(),
            custom_title: sess.custom_title.clone(),
            custom_summary: sess.custom_summary.clone(),
            original_summary: sess.original_summary.clone(),
            extracted_text: self.encrypt_text(&sess.extracted_text)?,
            entities_json: sess.entities_json.clone(),
            synthesis_status: sess.synthesis_status,
            ai_summary: sess.ai_summary.clone(),
            ai_bullets: sess.ai_bullets.clone(),
            created_at: sess.created_at,
            updated_at: sess.updated_at,
        };
        session::update(&self.pool, &row).await?;

        if text_changed && !sess.extracted_text.is_empty() {
            self.enqueue_embedding_refresh(sess.id, &sess.extracted_text);
        }
        Ok(())
    }

    fn enqueue_embedding_refresh(&self, session_id: i64, text: &str) {
        let vector = self.embedder.embed(text);
        let model_version = self.embedder.model_version().to_string();
        if vector.is_empty() || model_version.is_empty() {
            self.missed_embedding_refresh.fetch_add(1, Ordering::Relaxed);
            warn!(session_id, "embedding refresh enqueue failed, dropping");
            return;
        }
        self.batcher.enqueue(session_id, vector, model_version);
    }

    /// Writes back entity/summary fields produced by the Synthesis Worker
    /// without disturbing user-authored fields, and without triggering an
    /// embedding refresh (synthesis does not change `extracted_text`).
    /// Replaces that session's KnowledgeCard wholesale (there is at most one
    /// per session).
    #[instrument(skip(self, entities, ai_bullets))]
    pub async fn update_session_synthesis(
        &self,
        session_id: i64,
        status: SynthesisStatus,
        entities: &[Entity],
        ai_bullets: &[String],
        ai_summary: Option<&str>,
    ) -> Result<()> {
        session::update_synthesis(&self.pool, session_id, status, entities, ai_bullets, ai_summary).await?;

        let sess = session::get_by_id(&self.pool, session_id).await?;
        let title = sess.custom_title.clone().unwrap_or(sess.date);
        knowledge_card::upsert(
            &self.pool,
            session_id,
            &title,
            ai_bullets,
            entities,
            status,
        )
        .await?;
        Ok(())
    }

    /// Relational delete cascades metadata; vector delete and blob subtree
    /// delete are best-effort after relational success.
    #[instrument(skip(self))]
    pub async fn delete_session(&self, date: &str) -> Result<()> {
        let row = session::get_by_date(&self.pool, date).await?;
        session::delete(&self.pool, row.id).await?;

        if let Err(e) = self.vector.delete(row.id) {
            warn!(date, error = %e, "vector delete failed after relational delete");
        }
        if let Err(e) = self.blob.delete_session_subtree(date).await {
            warn!(date, error = %e, "blob subtree delete failed after relational delete");
        }
        Ok(())
    }

    #[instrument(skip(self, ocr_text, structured_metadata))]
    #[allow(clippy::too_many_arguments)]
    pub async fn add_activity_block(
        &self,
        date: &str,
        app: &str,
        block_id: &str,
        start_time: chrono::DateTime<chrono::Utc>,
        end_time: chrono::DateTime<chrono::Utc>,
        ocr_text: &str,
        micro_summary: Option<&str>,
        capture_source: CaptureSource,
        structured_metadata: serde_json::Value,
    ) -> Result<ActivityBlock> {
        let sess = session::get_by_date(&self.pool, date).await?;
        let app_activity = activity::get_or_create_app_activity(&self.pool, sess.id, app).await?;
        let ciphertext = self.encrypt_text(ocr_text)?;
        let row = activity::upsert_block(
            &self.pool,
            app_activity.id,
            block_id,
            start_time,
            end_time,
            &ciphertext,
            micro_summary,
            capture_source,
            &structured_metadata,
        )
        .await?;

        self.append_extracted_text(&sess, ocr_text, micro_summary).await?;

        self.hydrate_block(row)
    }

    /// Appends this block's OCR/structured text onto the owning session's
    /// accumulated `extracted_text`, the text the Synthesis Worker later
    /// mines for entities and bullets.
    async fn append_extracted_text(
        &self,
        sess: &db::models::SessionRow,
        ocr_text: &str,
        micro_summary: Option<&str>,
    ) -> Result<()> {
        let mut addition = String::new();
        if let Some(summary) = micro_summary {
            addition.push_str(summary);
        }
        if !ocr_text.is_empty() {
            if !addition.is_empty() {
                addition.push('\n');
            }
            addition.push_str(ocr_text);
        }
        if addition.is_empty() {
            return Ok(());
        }

        let mut updated_text = self.decrypt_text(&sess.extracted_text)?;
        if !updated_text.is_empty() {
            updated_text.push('\n');
        }
        updated_text.push_str(&addition);

        let mut row = sess.clone();
        row.extracted_text = self.encrypt_text(&updated_text)?;
        session::update(&self.pool, &row).await?;

        self.enqueue_embedding_refresh(sess.id, &updated_text);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_activity_blocks(&self, date: &str, app: &str) -> Result<Vec<ActivityBlock>> {
        let sess = session::get_by_date(&self.pool, date).await?;
        let rows = activity::list_blocks_for_app(&self.pool, sess.id, app).await?;
        rows.into_iter().map(|r| self.hydrate_block(r)).collect()
    }

    pub async fn list_app_activities(&self, date: &str) -> Result<Vec<AppActivity>> {
        let sess = session::get_by_date(&self.pool, date).await?;
        activity::list_app_activities_for_session(&self.pool, sess.id).await
    }

    #[instrument(skip(self, content))]
    pub async fn add_chat(&self, date: &str, role: ChatRole, content: &str) -> Result<ChatMessage> {
        let sess = session::get_by_date(&self.pool, date).await?;
        let ciphertext = self.encrypt_text(content)?;
        let row = chat::append(&self.pool, sess.id, role, &ciphertext).await?;
        self.hydrate_chat(row)
    }

    pub async fn list_chats(&self, date: &str) -> Result<Vec<ChatMessage>> {
        let sess = session::get_by_date(&self.pool, date).await?;
        let rows = chat::list_for_session(&self.pool, sess.id).await?;
        rows.into_iter().map(|r| self.hydrate_chat(r)).collect()
    }

    #[instrument(skip(self, bytes))]
    pub async fn save_screenshot(&self, date: &str, app: &str, name: &str, bytes: &[u8]) -> Result<String> {
        self.blob.save(date, app, name, bytes).await
    }

    pub async fn save_latest_screenshot(&self, date: &str, app: &str, bytes: &[u8]) -> Result<String> {
        self.blob.save_latest(date, app, bytes).await
    }

    pub async fn add_manual_note(&self, date: &str, content: &str) -> Result<ManualNote> {
        let sess = session::get_by_date(&self.pool, date).await?;
        manual_note::create(&self.pool, sess.id, content).await
    }

    pub async fn list_manual_notes(&self, date: &str) -> Result<Vec<ManualNote>> {
        let sess = session::get_by_date(&self.pool, date).await?;
        manual_note::list_for_session(&self.pool, sess.id).await
    }

    pub async fn create_notification(
        &self,
        notification_type: &str,
        title: &str,
        message: &str,
        session_ref: Option<i64>,
    ) -> Result<Notification> {
        notification::create(&self.pool, notification_type, title, message, session_ref).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<()> {
        notification::mark_read(&self.pool, id).await
    }

    pub async fn list_unread_notifications(&self) -> Result<Vec<Notification>> {
        notification::list_unread(&self.pool).await
    }

    pub async fn get_knowledge_card(&self, date: &str) -> Result<Option<KnowledgeCard>> {
        let sess = session::get_by_date(&self.pool, date).await?;
        knowledge_card::get_for_session(&self.pool, sess.id).await
    }

    #[instrument(skip(self))]
    pub async fn full_text_search(&self, query: &str, page: usize, page_size: usize) -> Result<Page<SearchHit>> {
        let (matches, total) = search::search_sessions(&self.pool, query, page, page_size).await?;
        let mut items = Vec::with_capacity(matches.len());
        for m in matches {
            let session = self.hydrate_session(m.row)?;
            items.push(SearchHit {
                session,
                score: -m.rank,
                snippet: m.snippet,
                match_type: "fulltext",
            });
        }
        Ok(Page {
            items,
            page,
            page_size,
            total,
        })
    }

    /// Top-k nearest sessions by cosine similarity, optionally filtered to a
    /// `[start, end]` inclusive date range (both `YYYY-MM-DD`).
    #[instrument(skip(self))]
    pub async fn semantic_search(
        &self,
        query_text: &str,
        k: usize,
        date_range: Option<(&str, &str)>,
    ) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query_text);
        let matches = self.vector.search(&query_vector, k)?;

        let mut hits = Vec::with_capacity(matches.len());
        for m in matches {
            let row = match session::get_by_id(&self.pool, m.session_id).await {
                Ok(row) => row,
                Err(WaddleError::NotFound(_)) => continue, // stale vector entry; orphan sweep will clear it
                Err(e) => return Err(e),
            };
            if let Some((start, end)) = date_range {
                if row.date.as_str() < start || row.date.as_str() > end {
                    continue;
                }
            }
            let session = self.hydrate_session(row)?;
            let snippet: String = session.extracted_text.chars().take(200).collect();
            hits.push(SearchHit {
                session,
                score: m.score as f64,
                snippet,
                match_type: "semantic",
            });
        }
        Ok(hits)
    }

    /// Probe each store and return its status, latency, and an optional
    /// message; aggregate is unhealthy if any store is unhealthy, else
    /// degraded if any is degraded, else healthy.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthReport {
        let relational = self.probe_relational().await;
        let vector = self.probe_vector();
        let blob = self.probe_blob().await;

        let aggregate = if [&relational, &vector, &blob]
            .iter()
            .any(|h| h.status == StoreStatus::Unhealthy)
        {
            StoreStatus::Unhealthy
        } else if [&relational, &vector, &blob]
            .iter()
            .any(|h| h.status == StoreStatus::Degraded)
        {
            StoreStatus::Degraded
        } else {
            StoreStatus::Healthy
        };

        HealthReport {
            relational,
            vector,
            blob,
            aggregate,
            missed_embedding_refresh: self.missed_embedding_refresh_count(),
        }
    }

    async fn probe_relational(&self) -> StoreHealth {
        let start = Instant::now();
        match db::integrity_check(&self.pool).await {
            Ok(true) => match sqlx::query("SELECT 1").execute(&self.pool).await {
                Ok(_) => StoreHealth {
                    status: StoreStatus::Healthy,
                    latency_ms: start.elapsed().as_millis() as u64,
                    message: None,
                },
                Err(e) => StoreHealth {
                    status: StoreStatus::Degraded,
                    latency_ms: start.elapsed().as_millis() as u64,
                    message: Some(e.to_string()),
                },
            },
            Ok(false) => StoreHealth {
                status: StoreStatus::Unhealthy,
                latency_ms: start.elapsed().as_millis() as u64,
                message: Some("integrity_check failed".to_string()),
            },
            Err(e) => StoreHealth {
                status: StoreStatus::Unhealthy,
                latency_ms: start.elapsed().as_millis() as u64,
                message: Some(e.to_string()),
            },
        }
    }

    fn probe_vector(&self) -> StoreHealth {
        let start = Instant::now();
        let dim = self.embedder.embed("").len().max(1);
        let zero_query = vec![0.0f32; dim];
        match self.vector.search(&zero_query, 1) {
            Ok(_) => StoreHealth {
                status: StoreStatus::Healthy,
                latency_ms: start.elapsed().as_millis() as u64,
                message: None,
            },
            Err(e) => StoreHealth {
                status: StoreStatus::Degraded,
                latency_ms: start.elapsed().as_millis() as u64,
                message: Some(e.to_string()),
            },
        }
    }

    async fn probe_blob(&self) -> StoreHealth {
        let start = Instant::now();
        let probe_path = self.blob.root().join(".health_probe");
        let result: std::result::Result<(), std::io::Error> = async {
            tokio::fs::create_dir_all(self.blob.root()).await?;
            tokio::fs::write(&probe_path, b"ok").await?;
            tokio::fs::remove_file(&probe_path).await?;
            Ok(())
        }
        .await;
        match result.map_err(WaddleError::from) {
            Ok(()) => StoreHealth {
                status: StoreStatus::Healthy,
                latency_ms: start.elapsed().as_millis() as u64,
                message: None,
            },
            Err(e) => StoreHealth {
                status: StoreStatus::Unhealthy,
                latency_ms: start.elapsed().as_millis() as u64,
                message: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::vector::VectorConfig;
    use crate::crypto::Keystore;
    use crate::storage::DeterministicEmbedder;
    use std::time::Duration;

    async fn test_engine() -> (StorageEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open_in_memory().await.unwrap();
        let keystore = Keystore::new_for_test();
        let vector_cfg = VectorConfig {
            dimension: 16,
            partitions: 4,
            sub_vectors: 2,
            search_nprobe: 4,
            batch_size: 4,
            batch_timeout: Duration::from_millis(20),
            root: dir.path().join("vectors"),
        };
        let vector = Arc::new(VectorIndex::open(vector_cfg).unwrap());
        let batcher = VectorBatcher::spawn(vector.clone(), 4, Duration::from_millis(20));
        let blob = BlobStore::new(dir.path().join("files"));
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder::new(16));
        let engine = StorageEngine::new(pool, keystore, vector, batcher, blob, embedder, dir.path().to_path_buf());
        (engine, dir)
    }

    #[tokio::test]
    async fn create_and_get_session_roundtrips() {
        let (engine, _dir) = test_engine().await;
        let created = engine.create_session("2025-01-16").await.unwrap();
        assert_eq!(created.synthesis_status, SynthesisStatus::Pending);
        let fetched = engine.get_session("2025-01-16").await.unwrap();
        assert_eq!(fetched.date, "2025-01-16");
    }

    #[tokio::test]
    async fn duplicate_date_create_is_conflict() {
        let (engine, _dir) = test_engine().await;
        engine.create_session("2025-01-16").await.unwrap();
        let err = engine.create_session("2025-01-16").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn update_session_encrypts_extracted_text_at_rest() {
        let (engine, _dir) = test_engine().await;
        let mut session = engine.create_session("2025-01-16").await.unwrap();
        session.extracted_text = "some private screen text".to_string();
        engine.update_session(&session).await.unwrap();

        let row = crate::db::session::get_by_id(engine.pool(), session.id).await.unwrap();
        assert_ne!(row.extracted_text, session.extracted_text.as_bytes());

        let fetched = engine.get_session("2025-01-16").await.unwrap();
        assert_eq!(fetched.extracted_text, "some private screen text");
    }

    #[tokio::test]
    async fn delete_session_removes_from_all_stores() {
        let (engine, _dir) = test_engine().await;
        let session = engine.create_session("2025-01-16").await.unwrap();
        engine.vector.store(session.id, vec![0.1; 16], "v1").unwrap();
        engine
            .save_screenshot("2025-01-16", "Chrome", "a.png", b"x")
            .await
            .unwrap();

        engine.delete_session("2025-01-16").await.unwrap();

        assert!(engine.get_session("2025-01-16").await.is_err());
        assert!(engine.vector.get(session.id).is_err());
        assert!(engine
            .blob
            .list_session_files("2025-01-16")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn pause_blocks_wait_until_resumed_until_resume_is_called() {
        let (engine, _dir) = test_engine().await;
        engine.pause();
        let engine = Arc::new(engine);
        let waiter = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.wait_until_resumed().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        engine.resume();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("resume should unblock waiter")
            .unwrap();
    }

    #[tokio::test]
    async fn full_text_search_finds_custom_title() {
        let (engine, _dir) = test_engine().await;
        let mut session = engine.create_session("2025-01-16").await.unwrap();
        session.custom_title = Some("Quarterly planning".to_string());
        engine.update_session(&session).await.unwrap();

        let page = engine.full_text_search("quarterly", 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].session.date, "2025-01-16");
        assert_eq!(page.items[0].match_type, "fulltext");
    }

    #[tokio::test]
    async fn semantic_search_respects_date_range_filter() {
        let (engine, _dir) = test_engine().await;
        let mut a = engine.create_session("2025-01-01").await.unwrap();
        a.extracted_text = "writing rust code all day".to_string();
        engine.update_session(&a).await.unwrap();
        let mut b = engine.create_session("2025-06-01").await.unwrap();
        b.extracted_text = "writing rust code all day".to_string();
        engine.update_session(&b).await.unwrap();
        engine.batcher.flush();

        let hits = engine
            .semantic_search("writing rust code", 10, Some(("2025-01-01", "2025-03-01")))
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.session.date <= "2025-03-01".to_string()));
    }
}
