// src/synthesis/worker.rs
// Periodic singleton: every tick, acquire a process-wide processing flag,
// drain pending-synthesis sessions in FIFO order, write results back through
// the Storage Engine, release the flag.

use super::entities::extract_entities;
use super::summarizer::Summarizer;
use crate::db::models::SynthesisStatus;
use crate::storage::StorageEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

pub struct SynthesisWorker {
    engine: Arc<StorageEngine>,
    summarizer: Arc<dyn Summarizer>,
    tick_interval: std::time::Duration,
    processing: Arc<AtomicBool>,
    cancel_tx: parking_lot::Mutex<Option<watch::Sender<bool>>>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl SynthesisWorker {
    pub fn new(
        engine: Arc<StorageEngine>,
        summarizer: Arc<dyn Summarizer>,
        tick_interval: std::time::Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            summarizer,
            tick_interval,
            processing: Arc::new(AtomicBool::new(false)),
            cancel_tx: parking_lot::Mutex::new(None),
            handle: parking_lot::Mutex::new(None),
        })
    }

    pub fn start(self: &Arc<Self>) {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        *self.cancel_tx.lock() = Some(cancel_tx);
        let worker = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(worker.tick_interval);
            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => break,
                    _ = ticker.tick() => worker.run_tick().await,
                }
            }
        });
        *self.handle.lock() = Some(handle);
    }

    pub async fn stop(&self) {
        if let Some(tx) = self.cancel_tx.lock().take() {
            let _ = tx.send(true);
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// One synthesis pass, exposed directly for tests that don't want to wait
    /// on the tick interval.
    #[instrument(skip(self))]
    pub async fn run_tick(&self) {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        match self.engine.list_pending_synthesis().await {
            Ok(sessions) => {
                for session in sessions {
                    self.process_session(session.id, &session.extracted_text).await;
                }
            }
            Err(e) => warn!(error = %e, "failed to list pending-synthesis sessions"),
        }

        self.processing.store(false, Ordering::SeqCst);
    }

    #[instrument(skip(self, text))]
    async fn process_session(&self, session_id: i64, text: &str) {
        let entities = extract_entities(text);
        let (bullets, ai_summary) = self.summarizer.summarize(text);
        let bullets = super::summarizer::ensure_three_bullets(bullets);

        let result = self
            .engine
            .update_session_synthesis(
                session_id,
                SynthesisStatus::Completed,
                &entities,
                &bullets,
                Some(&ai_summary),
            )
            .await;

        match result {
            Ok(()) => info!(session_id, "synthesis completed"),
            Err(e) => {
                warn!(session_id, error = %e, "synthesis failed, marking session failed");
                let _ = self
                    .engine
                    .update_session_synthesis(
                        session_id,
                        SynthesisStatus::Failed,
                        &[],
                        &super::summarizer::ensure_three_bullets(Vec::new()),
                        Some(&e.to_string()),
                    )
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::vector::VectorConfig;
    use crate::crypto::Keystore;
    use crate::db;
    use crate::storage::DeterministicEmbedder;
    use crate::synthesis::summarizer::LocalFallbackSummarizer;
    use crate::vector::{VectorBatcher, VectorIndex};
    use std::time::Duration;

    async fn test_engine() -> (Arc<StorageEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open_in_memory().await.unwrap();
        let keystore = Keystore::new_for_test();
        let vector_cfg = VectorConfig {
            dimension: 8,
            partitions: 4,
            sub_vectors: 2,
            search_nprobe: 4,
            batch_size: 4,
            batch_timeout: Duration::from_millis(20),
            root: dir.path().join("vectors"),
        };
        let vector = Arc::new(VectorIndex::open(vector_cfg).unwrap());
        let batcher = VectorBatcher::spawn(vector.clone(), 4, Duration::from_millis(20));
        let blob = crate::blob::BlobStore::new(dir.path().join("files"));
        let embedder: Arc<dyn crate::storage::Embedder> = Arc::new(DeterministicEmbedder::new(8));
        let engine = Arc::new(StorageEngine::new(
            pool,
            keystore,
            vector,
            batcher,
            blob,
            embedder,
            dir.path().to_path_buf(),
        ));
        (engine, dir)
    }

    #[tokio::test]
    async fn processes_pending_session_and_extracts_entities() {
        let (engine, _dir) = test_engine().await;
        let mut session = engine.create_session("2025-01-15").await.unwrap();
        session.extracted_text = "Working on PROJ-123 #bug".to_string();
        engine.update_session(&session).await.unwrap();

        let worker = SynthesisWorker::new(engine.clone(), Arc::new(LocalFallbackSummarizer), Duration::from_secs(30));
        worker.run_tick().await;

        let updated = engine.get_session("2025-01-15").await.unwrap();
        assert_eq!(updated.synthesis_status, SynthesisStatus::Completed);
        assert_eq!(updated.ai_bullets.len(), 3);
        assert!(updated
            .entities_json
            .iter()
            .any(|e| e.entity_type == "jira" && e.value == "PROJ-123"));
        assert!(updated
            .entities_json
            .iter()
            .any(|e| e.entity_type == "hashtag" && e.value == "#bug"));
    }

    #[tokio::test]
    async fn completed_session_is_not_reprocessed() {
        let (engine, _dir) = test_engine().await;
        let mut session = engine.create_session("2025-01-15").await.unwrap();
        session.extracted_text = "some text".to_string();
        engine.update_session(&session).await.unwrap();

        let worker = SynthesisWorker::new(engine.clone(), Arc::new(LocalFallbackSummarizer), Duration::from_secs(30));
        worker.run_tick().await;
        let first_pass = engine.get_session("2025-01-15").await.unwrap();

        worker.run_tick().await;
        let second_pass = engine.get_session("2025-01-15").await.unwrap();
        assert_eq!(first_pass.updated_at, second_pass.updated_at);
    }
}
