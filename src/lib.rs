// src/lib.rs
// Composition root: wires the Keystore, tri-store, Capture Pipeline, and
// Synthesis Worker into one handle, assembled behind a single async
// constructor.

pub mod backup;
pub mod blob;
pub mod capture;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod recovery;
pub mod storage;
pub mod synthesis;
pub mod vector;

use backup::RetentionReport;
use capture::{AccessibilityReader, CapturePipeline, FocusSource, OcrClient, PipelineStats};
use config::WaddleConfig;
use crypto::{Keystore, SecretStore};
use error::Result;
use storage::{Embedder, HealthReport, StorageEngine};
use synthesis::{Summarizer, SynthesisWorker};
use vector::{VectorBatcher, VectorIndex};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Platform-specific collaborators the Capture Pipeline runs against. These
/// are the trait seams spec'd as out of scope for this engine to implement
/// natively (OS event subscription, accessibility APIs, OCR) — a deployment
/// supplies real implementations here; [`Waddle::new`] otherwise falls back
/// to the inert `Null*` adapters so the pipeline still starts and runs.
pub struct Collaborators {
    pub focus_source: Arc<dyn FocusSource>,
    pub accessibility: Arc<dyn AccessibilityReader>,
    pub ocr: Arc<dyn OcrClient>,
    pub embedder: Arc<dyn Embedder>,
    pub summarizer: Arc<dyn Summarizer>,
    pub secret_store: Arc<dyn SecretStore>,
}

impl Collaborators {
    /// Local-only defaults: no platform capture backend, deterministic
    /// embedding, and the truncate-and-split summarizer fallback. Suitable
    /// for a first run with no external services configured.
    pub fn local_defaults(vector_dimension: usize, service_name: impl Into<String>) -> Self {
        Self {
            focus_source: Arc::new(capture::NullFocusSource),
            accessibility: Arc::new(capture::ThreadedAccessibilityReader::spawn(
                Box::new(capture::NullAccessibilityBackend),
                std::time::Duration::from_secs(5),
                std::time::Duration::from_secs(10),
            )),
            ocr: Arc::new(capture::NullOcrClient),
            embedder: Arc::new(storage::DeterministicEmbedder::new(vector_dimension)),
            summarizer: Arc::new(synthesis::LocalFallbackSummarizer),
            secret_store: Arc::new(crypto::KeyringSecretStore::new(service_name)),
        }
    }
}

/// The assembled engine: Storage Engine plus the two background components
/// (Capture Pipeline, Synthesis Worker) that drive it. Owns nothing the
/// caller can't also reach through [`Waddle::engine`] — `start`/`stop` only
/// toggle the background tasks.
pub struct Waddle {
    pub config: WaddleConfig,
    pub engine: Arc<StorageEngine>,
    pub pipeline: Arc<CapturePipeline>,
    pub synthesis_worker: Arc<SynthesisWorker>,
}

impl Waddle {
    pub async fn new(config: WaddleConfig, collaborators: Collaborators) -> Result<Self> {
        config
            .validate()
            .map_err(|e| error::WaddleError::validation(e))?;
        std::fs::create_dir_all(&config.data_dir)?;

        let pool = db::open(&config.db_path(), config.storage.db_busy_timeout).await?;
        let keystore = Keystore::open(collaborators.secret_store, &config.crypto)?;

        let vector = Arc::new(VectorIndex::open(config.vector.clone())?);
        let batcher = VectorBatcher::spawn(vector.clone(), config.vector.batch_size, config.vector.batch_timeout);
        let blob = blob::BlobStore::new(config.blob_root());

        let engine = Arc::new(StorageEngine::new(
            pool,
            keystore,
            vector,
            batcher,
            blob,
            collaborators.embedder,
            config.data_dir.clone(),
        ));

        let pipeline = CapturePipeline::new(
            engine.clone(),
            collaborators.focus_source,
            collaborators.accessibility,
            collaborators.ocr,
            config.capture.clone(),
        );

        let synthesis_worker = SynthesisWorker::new(
            engine.clone(),
            collaborators.summarizer,
            config.synthesis.tick_interval,
        );

        info!(data_dir = %config.data_dir.display(), "waddle engine assembled");
        Ok(Self {
            config,
            engine,
            pipeline,
            synthesis_worker,
        })
    }

    /// Starts the Capture Pipeline and Synthesis Worker. Idempotent only at
    /// the pipeline level (double-start is an error); the worker's `start`
    /// replaces its cancellation handle unconditionally, so this should only
    /// be called once per `Waddle`.
    pub fn start(&self) -> Result<()> {
        self.pipeline.start()?;
        self.synthesis_worker.start();
        Ok(())
    }

    pub async fn stop(&self) {
        self.pipeline.stop().await;
        self.synthesis_worker.stop().await;
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub async fn health_check(&self) -> HealthReport {
        self.engine.health_check().await
    }

    /// Snapshots the tri-store under `{data_dir}/backups/backup-{timestamp}`.
    pub async fn backup(&self) -> Result<PathBuf> {
        backup::backup(&self.engine, &self.config.backups_root()).await
    }

    pub async fn run_retention(&self) -> Result<RetentionReport> {
        backup::run_retention(&self.engine, self.config.storage.retention_days).await
    }

    /// Detects and repairs relational-store corruption in place. Returns
    /// whether recovery ran. Does not restart the Capture Pipeline or
    /// Synthesis Worker; callers that called [`Waddle::start`] should
    /// `stop`/`start` around this if recovery reports `true`.
    pub async fn recover_if_corrupt(&self) -> Result<bool> {
        recovery::recover_if_corrupt(&self.engine, &self.config.db_path(), self.config.storage.db_busy_timeout).await
    }
}
