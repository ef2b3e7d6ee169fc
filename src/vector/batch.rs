// src/vector/batch.rs
// Batched vector insertion: coalesce stores into a buffer, flush on max-size
// OR max-wait. The wakeup channel has capacity 1, so a pile of redundant
// signals never accumulates between flushes.

use super::index::VectorIndex;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, warn};

struct PendingItem {
    session_id: i64,
    vector: Vec<f32>,
    model_version: String,
}

#[derive(Debug, Clone, Default)]
pub struct VectorBatchStats {
    pub current_batch_size: usize,
    pub max_batch_size: usize,
    pub batch_timeout: Duration,
    pub last_flush_time: Option<SystemTime>,
}

struct BatchState {
    pending: Vec<PendingItem>,
    first_enqueued_at: Option<Instant>,
    last_flush_time: Option<SystemTime>,
}

pub struct VectorBatcher {
    index: Arc<VectorIndex>,
    batch_size: usize,
    batch_timeout: Duration,
    state: Mutex<BatchState>,
    signal_tx: mpsc::Sender<()>,
    dropped_on_flush_failure: AtomicUsize,
}

impl VectorBatcher {
    pub fn spawn(index: Arc<VectorIndex>, batch_size: usize, batch_timeout: Duration) -> Arc<Self> {
        let (signal_tx, signal_rx) = mpsc::channel(1);
        let batcher = Arc::new(Self {
            index,
            batch_size,
            batch_timeout,
            state: Mutex::new(BatchState {
                pending: Vec::new(),
                first_enqueued_at: None,
                last_flush_time: None,
            }),
            signal_tx,
            dropped_on_flush_failure: AtomicUsize::new(0),
        });
        batcher.clone().spawn_flusher(signal_rx);
        batcher
    }

    fn spawn_flusher(self: Arc<Self>, mut signal_rx: mpsc::Receiver<()>) {
        tokio::spawn(async move {
            loop {
                let deadline = self.next_deadline();
                match deadline {
                    Some(d) => {
                        tokio::select! {
                            _ = signal_rx.recv() => {}
                            _ = sleep(d) => {}
                        }
                    }
                    None => {
                        // Nothing pending: block until something is enqueued.
                        if signal_rx.recv().await.is_none() {
                            return;
                        }
                    }
                }
                self.flush();
            }
        });
    }

    fn next_deadline(&self) -> Option<Duration> {
        let state = self.state.lock();
        state.first_enqueued_at.map(|at| {
            let elapsed = at.elapsed();
            self.batch_timeout.saturating_sub(elapsed)
        })
    }

    /// Enqueue an item; flushes immediately (via the signal channel) once the
    /// buffer reaches `batch_size`.
    pub fn enqueue(&self, session_id: i64, vector: Vec<f32>, model_version: impl Into<String>) {
        let should_signal = {
            let mut state = self.state.lock();
            if state.first_enqueued_at.is_none() {
                state.first_enqueued_at = Some(Instant::now());
            }
            state.pending.push(PendingItem {
                session_id,
                vector,
                model_version: model_version.into(),
            });
            state.pending.len() >= self.batch_size
        };
        if should_signal {
            let _ = self.signal_tx.try_send(());
        }
    }

    /// Flush the current buffer. Best-effort: a whole-batch failure falls back
    /// to per-item inserts, and items that still fail are reported.
    pub fn flush(&self) -> Vec<(i64, String)> {
        let items = {
            let mut state = self.state.lock();
            state.first_enqueued_at = None;
            std::mem::take(&mut state.pending)
        };
        if items.is_empty() {
            return Vec::new();
        }

        let mut failures = Vec::new();
        for item in items {
            if let Err(e) = self.store_one(&item) {
                warn!(session_id = item.session_id, error = %e, "vector batch item failed, falling back to per-item insert result");
                failures.push((item.session_id, e.to_string()));
            }
        }
        if !failures.is_empty() {
            self.dropped_on_flush_failure
                .fetch_add(failures.len(), Ordering::Relaxed);
            error!(count = failures.len(), "vector batch flush had per-item failures");
        }
        self.state.lock().last_flush_time = Some(SystemTime::now());
        failures
    }

    fn store_one(&self, item: &PendingItem) -> Result<()> {
        self.index
            .store(item.session_id, item.vector.clone(), item.model_version.clone())
    }

    pub fn stats(&self) -> VectorBatchStats {
        let state = self.state.lock();
        VectorBatchStats {
            current_batch_size: state.pending.len(),
            max_batch_size: self.batch_size,
            batch_timeout: self.batch_timeout,
            last_flush_time: state.last_flush_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::vector::VectorConfig;

    fn test_index(dim: usize) -> Arc<VectorIndex> {
        let dir = tempfile::tempdir().unwrap();
        let cfg = VectorConfig {
            dimension: dim,
            partitions: 4,
            sub_vectors: 2,
            search_nprobe: 4,
            batch_size: 4,
            batch_timeout: Duration::from_millis(20),
            root: dir.path().to_path_buf(),
        };
        std::mem::forget(dir); // keep temp dir alive for test lifetime
        Arc::new(VectorIndex::open(cfg).unwrap())
    }

    #[tokio::test]
    async fn flush_on_max_size() {
        let index = test_index(4);
        let batcher = VectorBatcher::spawn(index.clone(), 2, Duration::from_secs(10));
        batcher.enqueue(1, vec![1.0, 0.0, 0.0, 0.0], "v1");
        batcher.enqueue(2, vec![0.0, 1.0, 0.0, 0.0], "v1");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn flush_on_timeout() {
        let index = test_index(4);
        let batcher = VectorBatcher::spawn(index.clone(), 100, Duration::from_millis(30));
        batcher.enqueue(1, vec![1.0, 0.0, 0.0, 0.0], "v1");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn stats_report_buffer_state() {
        let index = test_index(4);
        let batcher = VectorBatcher::spawn(index, 10, Duration::from_secs(5));
        batcher.enqueue(1, vec![1.0, 0.0, 0.0, 0.0], "v1");
        let stats = batcher.stats();
        assert_eq!(stats.current_batch_size, 1);
        assert_eq!(stats.max_batch_size, 10);
    }
}
