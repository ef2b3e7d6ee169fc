// src/vector/index.rs

use crate::config::vector::VectorConfig;
use crate::error::{Result, WaddleError};
use anndists::dist::DistCosine;
use chrono::{DateTime, Utc};
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub session_id: i64,
    pub vector: Vec<f32>,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub session_id: i64,
    pub score: f32,
}

struct Snapshot {
    records: HashMap<i64, VectorRecord>,
}

/// Content-addressed (by `session_id`) ANN index, backed by an in-memory HNSW
/// graph that is rebuilt from a flat `meta.json` snapshot on load. `hnsw_rs`
/// does not support true point deletion, so deletes/updates are modeled as a
/// remove-then-rebuild of the graph from the surviving record set — acceptable
/// at the session counts (tens of thousands) this engine targets.
pub struct VectorIndex {
    config: VectorConfig,
    root: PathBuf,
    state: RwLock<Snapshot>,
}

impl VectorIndex {
    pub fn open(config: VectorConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.root)?;
        let root = config.root.clone();
        let records = load_snapshot(&root)?;
        info!(count = records.len(), "vector index loaded");
        Ok(Self {
            config,
            root,
            state: RwLock::new(Snapshot { records }),
        })
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(WaddleError::validation(format!(
                "expected {}-dim vector, got {}",
                self.config.dimension,
                vector.len()
            )));
        }
        Ok(())
    }

    /// Immediate upsert (delete-then-insert).
    pub fn store(
        &self,
        session_id: i64,
        vector: Vec<f32>,
        model_version: impl Into<String>,
    ) -> Result<()> {
        self.validate_dimension(&vector)?;
        let model_version = model_version.into();
        if model_version.is_empty() {
            return Err(WaddleError::validation("model_version must not be empty"));
        }
        let now = Utc::now();
        let mut state = self.state.write();
        let created_at = state
            .records
            .get(&session_id)
            .map(|r| r.created_at)
            .unwrap_or(now);
        state.records.insert(
            session_id,
            VectorRecord {
                session_id,
                vector,
                model_version,
                created_at,
                updated_at: now,
            },
        );
        debug!(session_id, "vector stored");
        Ok(())
    }

    pub fn update(
        &self,
        session_id: i64,
        vector: Vec<f32>,
        model_version: impl Into<String>,
    ) -> Result<()> {
        self.store(session_id, vector, model_version)
    }

    pub fn delete(&self, session_id: i64) -> Result<()> {
        self.state.write().records.remove(&session_id);
        debug!(session_id, "vector deleted");
        Ok(())
    }

    pub fn get(&self, session_id: i64) -> Result<VectorRecord> {
        self.state
            .read()
            .records
            .get(&session_id)
            .cloned()
            .ok_or_else(|| WaddleError::not_found(format!("no embedding for session {session_id}")))
    }

    /// Top-k nearest by cosine similarity, sorted descending. `k` is clamped to
    /// the current record count.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        self.validate_dimension(query)?;
        let state = self.state.read();
        let n = state.records.len();
        if n == 0 || k == 0 {
            return Ok(Vec::new());
        }
        let effective_k = k.min(n);

        // Build a transient HNSW graph from the current snapshot. At the
        // session-count scale this engine targets (tens of thousands) this is
        // cheap relative to the I/O cost of a search; a long-lived mutable
        // index is future work once hnsw_rs gains point deletion.
        let hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
            16,
            n.max(1),
            16,
            200,
            DistCosine {},
        );
        let mut id_to_session = HashMap::with_capacity(n);
        for (idx, record) in state.records.values().enumerate() {
            hnsw.insert((record.vector.as_slice(), idx));
            id_to_session.insert(idx, record.session_id);
        }

        let neighbours = hnsw.search(query, effective_k, self_ef(&self.config));
        let mut matches: Vec<VectorMatch> = neighbours
            .into_iter()
            .filter_map(|n| {
                id_to_session.get(&n.d_id).map(|sid| VectorMatch {
                    session_id: *sid,
                    score: 1.0 - n.distance,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(effective_k);
        Ok(matches)
    }

    pub fn flush(&self) -> Result<()> {
        let state = self.state.read();
        save_snapshot(&self.root, &state.records)
    }

    /// Recursively copy the vector directory (used by backup).
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Rebuild every embedding from a relational-store iterator, used by
    /// corruption recovery. `embed` re-derives a vector for a session.
    pub fn rebuild_from<F>(&self, sessions: &[(i64, String)], mut embed: F) -> Result<usize>
    where
        F: FnMut(i64) -> Option<(Vec<f32>, String)>,
    {
        let mut rebuilt = 0;
        for (session_id, _date) in sessions {
            if let Some((vector, model_version)) = embed(*session_id) {
                self.store(*session_id, vector, model_version)?;
                rebuilt += 1;
            } else {
                warn!(session_id, "could not re-embed session during rebuild");
            }
        }
        self.flush()?;
        Ok(rebuilt)
    }
}

fn self_ef(config: &VectorConfig) -> usize {
    (config.search_nprobe * 8).max(16)
}

fn load_snapshot(root: &Path) -> Result<HashMap<i64, VectorRecord>> {
    let path = root.join("meta.json");
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let bytes = std::fs::read(&path)?;
    let records: Vec<VectorRecord> = serde_json::from_slice(&bytes)?;
    Ok(records.into_iter().map(|r| (r.session_id, r)).collect())
}

fn save_snapshot(root: &Path, records: &HashMap<i64, VectorRecord>) -> Result<()> {
    let path = root.join("meta.json");
    let values: Vec<&VectorRecord> = records.values().collect();
    let bytes = serde_json::to_vec_pretty(&values)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(dim: usize, dir: &Path) -> VectorConfig {
        VectorConfig {
            dimension: dim,
            partitions: 4,
            sub_vectors: 2,
            search_nprobe: 4,
            batch_size: 8,
            batch_timeout: std::time::Duration::from_millis(50),
            root: dir.to_path_buf(),
        }
    }

    fn unit_vec(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn store_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(cfg(8, dir.path())).unwrap();
        idx.store(1, unit_vec(8, 0), "v1").unwrap();
        let rec = idx.get(1).unwrap();
        assert_eq!(rec.vector.len(), 8);
        assert_eq!(rec.model_version, "v1");
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(cfg(8, dir.path())).unwrap();
        idx.store(1, unit_vec(8, 0), "v1").unwrap();
        idx.delete(1).unwrap();
        assert!(idx.get(1).is_err());
    }

    #[test]
    fn search_ranks_closest_first_and_clamps_k() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(cfg(4, dir.path())).unwrap();
        for i in 0..5 {
            idx.store(i, unit_vec(4, (i % 4) as usize), "v1").unwrap();
        }
        let results = idx.search(&unit_vec(4, 0), 100).unwrap();
        assert!(results.len() <= 5);
        for w in results.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
    }

    #[test]
    fn wrong_dimension_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(cfg(8, dir.path())).unwrap();
        assert!(idx.store(1, vec![0.0; 4], "v1").is_err());
    }
}
