// src/capture/pipeline.rs
// Three-stage capture pipeline: focus-event ingest -> structured extraction ->
// batched OCR -> Storage Engine. Each stage is a cancellable background task
// connected to the next by the drop-oldest bounded queue from `queue.rs`.

use super::accessibility::{AccessibilityQuery, AccessibilityReader};
use super::focus::{FocusEvent, FocusSource};
use super::ocr::OcrClient;
use super::queue::DropOldestQueue;
use crate::config::capture::CaptureConfig;
use crate::db::models::CaptureSource;
use crate::error::{Result, WaddleError};
use crate::storage::StorageEngine;
use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub struct BlockDescriptor {
    pub date: String,
    pub app: String,
    pub block_id: String,
    pub window_handle: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Source tagged at Stage 1 (`etw` or `polling`); used to pick the final
    /// `ocr`/`polling_ocr` tag if the descriptor falls through to Stage 3.
    pub origin: CaptureSource,
    pub capture_source: CaptureSource,
    pub structured_metadata: serde_json::Value,
    pub screenshot: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub stage1_to_2_dropped: u64,
    pub stage2_to_3_dropped: u64,
    pub stage1_to_2_queued: usize,
    pub stage2_to_3_queued: usize,
}

pub struct CapturePipeline {
    engine: Arc<StorageEngine>,
    focus_source: Arc<dyn FocusSource>,
    accessibility: Arc<dyn AccessibilityReader>,
    ocr: Arc<dyn OcrClient>,
    config: CaptureConfig,
    queue_1_2: DropOldestQueue<BlockDescriptor>,
    queue_2_3: DropOldestQueue<BlockDescriptor>,
    running: AtomicBool,
    cancel_tx: Mutex<Option<watch::Sender<bool>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CapturePipeline {
    pub fn new(
        engine: Arc<StorageEngine>,
        focus_source: Arc<dyn FocusSource>,
        accessibility: Arc<dyn AccessibilityReader>,
        ocr: Arc<dyn OcrClient>,
        config: CaptureConfig,
    ) -> Arc<Self> {
        let queue_1_2 = DropOldestQueue::new(config.stage1_queue_capacity);
        let queue_2_3 = DropOldestQueue::new(config.stage2_queue_capacity);
        Arc::new(Self {
            engine,
            focus_source,
            accessibility,
            ocr,
            config,
            queue_1_2,
            queue_2_3,
            running: AtomicBool::new(false),
            cancel_tx: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            stage1_to_2_dropped: self.queue_1_2.dropped_count(),
            stage2_to_3_dropped: self.queue_2_3.dropped_count(),
            stage1_to_2_queued: self.queue_1_2.len(),
            stage2_to_3_queued: self.queue_2_3.len(),
        }
    }

    /// Starts all three stages. Double-start is an error, not a silent no-op.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WaddleError::conflict("capture pipeline is already running"));
        }
        let (cancel_tx, cancel_rx) = watch::channel(false);
        *self.cancel_tx.lock() = Some(cancel_tx);

        let mut handles = self.handles.lock();
        handles.push(tokio::spawn(self.clone().run_stage1(cancel_rx.clone())));
        handles.push(tokio::spawn(self.clone().run_stage2(cancel_rx.clone())));
        handles.push(tokio::spawn(self.clone().run_stage3(cancel_rx)));
        Ok(())
    }

    /// Cancels all stages, waits for them (bounded by the configured grace
    /// period), then closes the inter-stage queues. Stopping an already
    /// stopped pipeline is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.cancel_tx.lock().take() {
            let _ = tx.send(true);
        }
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if tokio::time::timeout(self.config.shutdown_grace_period, handle)
                .await
                .is_err()
            {
                warn!("capture stage did not shut down within the grace period");
            }
        }
        self.queue_1_2.close();
        self.queue_2_3.close();
    }

    async fn run_stage1(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = cancel.changed() => break,
                event = self.focus_source.next_event() => {
                    match event {
                        None => break,
                        Some(event) => self.handle_focus_event(event).await,
                    }
                }
            }
        }
    }

    #[instrument(skip(self, event))]
    async fn handle_focus_event(&self, event: FocusEvent) {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let block_id = format!("{:02}-{:02}", event.timestamp.hour(), event.timestamp.minute());
        let source = if self.focus_source.is_fallback() {
            CaptureSource::Polling
        } else {
            CaptureSource::Etw
        };

        match self.engine.ensure_session(&date).await {
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, date, "failed to ensure session for focus event");
                return;
            }
        }

        let descriptor = BlockDescriptor {
            date,
            app: event.process_name,
            block_id,
            window_handle: event.window_handle,
            start_time: event.timestamp,
            end_time: event.timestamp,
            origin: source,
            capture_source: source,
            structured_metadata: serde_json::Value::Null,
            screenshot: None,
        };
        self.queue_1_2.push(descriptor);
    }

    async fn run_stage2(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = cancel.changed() => break,
                popped = self.queue_1_2.pop() => {
                    match popped {
                        None => break,
                        Some(descriptor) => self.process_stage2(descriptor).await,
                    }
                }
            }
        }
    }

    async fn process_stage2(&self, mut descriptor: BlockDescriptor) {
        let query = AccessibilityQuery {
            app: descriptor.app.clone(),
            window_handle: descriptor.window_handle,
        };
        match self.accessibility.query(query).await {
            Ok(result) if result.valid => {
                descriptor.capture_source = CaptureSource::UiAutomation;
                descriptor.structured_metadata = result.metadata;
                self.write_block(descriptor, None).await;
            }
            Ok(_) => self.queue_2_3.push(descriptor),
            Err(e) => {
                warn!(error = %e, app = %descriptor.app, "accessibility query failed, falling back to OCR");
                self.queue_2_3.push(descriptor);
            }
        }
    }

    async fn run_stage3(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        let mut buffer: Vec<BlockDescriptor> = Vec::new();
        let mut first_enqueued: Option<Instant> = None;

        loop {
            let deadline = first_enqueued.map(|t: Instant| self.config.ocr_batch_timeout.saturating_sub(t.elapsed()));
            tokio::select! {
                _ = cancel.changed() => {
                    self.flush_ocr_batch(&mut buffer).await;
                    break;
                }
                popped = self.queue_2_3.pop() => {
                    match popped {
                        None => {
                            self.flush_ocr_batch(&mut buffer).await;
                            break;
                        }
                        Some(descriptor) => {
                            if buffer.is_empty() {
                                first_enqueued = Some(Instant::now());
                            }
                            buffer.push(descriptor);
                            if buffer.len() >= self.config.ocr_batch_size {
                                self.flush_ocr_batch(&mut buffer).await;
                                first_enqueued = None;
                            }
                        }
                    }
                }
                _ = sleep_or_pending(deadline) => {
                    self.flush_ocr_batch(&mut buffer).await;
                    first_enqueued = None;
                }
            }
        }
    }

    async fn flush_ocr_batch(&self, buffer: &mut Vec<BlockDescriptor>) {
        if buffer.is_empty() {
            return;
        }
        let items = std::mem::take(buffer);
        let images: Vec<Vec<u8>> = items
            .iter()
            .map(|d| d.screenshot.clone().unwrap_or_default())
            .collect();

        match self.ocr.recognize_batch(&images).await {
            Ok(results) => {
                for (mut descriptor, ocr_text) in items.into_iter().zip(results.into_iter()) {
                    descriptor.capture_source = final_source(descriptor.origin);
                    self.write_block(descriptor, ocr_text).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "OCR batch failed, writing blocks without recognized text");
                for mut descriptor in items {
                    descriptor.capture_source = final_source(descriptor.origin);
                    self.write_block(descriptor, None).await;
                }
            }
        }
    }

    async fn write_block(&self, descriptor: BlockDescriptor, ocr_text: Option<String>) {
        let micro_summary = ocr_text.as_deref().map(|t| t.chars().take(120).collect::<String>());
        if let Err(e) = self
            .engine
            .add_activity_block(
                &descriptor.date,
                &descriptor.app,
                &descriptor.block_id,
                descriptor.start_time,
                descriptor.end_time,
                ocr_text.as_deref().unwrap_or(""),
                micro_summary.as_deref(),
                descriptor.capture_source,
                descriptor.structured_metadata,
            )
            .await
        {
            warn!(error = %e, date = %descriptor.date, app = %descriptor.app, "failed to persist activity block");
        }
    }
}

fn final_source(origin: CaptureSource) -> CaptureSource {
    match origin {
        CaptureSource::Etw => CaptureSource::Ocr,
        _ => CaptureSource::PollingOcr,
    }
}

async fn sleep_or_pending(deadline: Option<std::time::Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::accessibility::FakeAccessibilityReader;
    use crate::capture::focus::ScriptedFocusSource;
    use crate::capture::ocr::FakeOcrClient;
    use crate::config::vector::VectorConfig;
    use crate::crypto::Keystore;
    use crate::db;
    use crate::storage::DeterministicEmbedder;
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

    fn event(minute: u32, app: &str) -> FocusEvent {
        FocusEvent {
            timestamp: "2025-01-16T10:00:00Z"
                .parse::<DateTime<Utc>>()
                .unwrap()
                .with_minute(minute)
                .unwrap(),
            window_handle: 1,
            process_id: 42,
            process_name: app.to_string(),
        }
    }

    #[tokio::test]
    async fn structured_path_skips_ocr_and_persists_block() {
        let (engine, _dir) = test_engine().await;
        let source = Arc::new(ScriptedFocusSource::new(vec![event(0, "VSCode")], false));
        let accessibility = Arc::new(FakeAccessibilityReader {
            valid_apps: vec!["VSCode".to_string()],
        });
        let ocr = Arc::new(FakeOcrClient);
        let config = CaptureConfig {
            stage1_queue_capacity: 10,
            stage2_queue_capacity: 10,
            ocr_batch_size: 10,
            ocr_batch_timeout: Duration::from_millis(50),
            accessibility_send_timeout: Duration::from_secs(5),
            accessibility_recv_timeout: Duration::from_secs(10),
            shutdown_grace_period: Duration::from_secs(1),
        };
        let pipeline = CapturePipeline::new(engine.clone(), source, accessibility, ocr, config);
        pipeline.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        pipeline.stop().await;

        let blocks = engine.get_activity_blocks("2025-01-16", "VSCode").await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].capture_source, CaptureSource::UiAutomation);
    }

    #[tokio::test]
    async fn unstructured_path_falls_through_to_ocr() {
        let (engine, _dir) = test_engine().await;
        let source = Arc::new(ScriptedFocusSource::new(vec![event(0, "Notepad")], false));
        let accessibility = Arc::new(FakeAccessibilityReader { valid_apps: vec![] });
        let ocr = Arc::new(FakeOcrClient);
        let config = CaptureConfig {
            stage1_queue_capacity: 10,
            stage2_queue_capacity: 10,
            ocr_batch_size: 1,
            ocr_batch_timeout: Duration::from_millis(50),
            accessibility_send_timeout: Duration::from_secs(5),
            accessibility_recv_timeout: Duration::from_secs(10),
            shutdown_grace_period: Duration::from_secs(1),
        };
        let pipeline = CapturePipeline::new(engine.clone(), source, accessibility, ocr, config);
        pipeline.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        pipeline.stop().await;

        let blocks = engine.get_activity_blocks("2025-01-16", "Notepad").await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].capture_source, CaptureSource::Ocr);
    }

    #[tokio::test]
    async fn double_start_is_an_error() {
        let (engine, _dir) = test_engine().await;
        let source = Arc::new(ScriptedFocusSource::new(vec![], false));
        let accessibility = Arc::new(FakeAccessibilityReader { valid_apps: vec![] });
        let ocr = Arc::new(FakeOcrClient);
        let config = CaptureConfig {
            stage1_queue_capacity: 10,
            stage2_queue_capacity: 10,
            ocr_batch_size: 10,
            ocr_batch_timeout: Duration::from_millis(50),
            accessibility_send_timeout: Duration::from_secs(5),
            accessibility_recv_timeout: Duration::from_secs(10),
            shutdown_grace_period: Duration::from_secs(1),
        };
        let pipeline = CapturePipeline::new(engine, source, accessibility, ocr, config);
        pipeline.start().unwrap();
        assert!(pipeline.start().is_err());
        pipeline.stop().await;
    }
}
