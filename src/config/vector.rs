// src/config/vector.rs

use super::parse_env_or;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct VectorConfig {
    pub dimension: usize,
    pub partitions: usize,
    pub sub_vectors: usize,
    pub search_nprobe: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub root: PathBuf,
}

impl VectorConfig {
    pub fn from_env(data_dir: &Path) -> Self {
        Self {
            dimension: parse_env_or("WADDLE_VECTOR_DIM", 768),
            partitions: parse_env_or("WADDLE_VECTOR_PARTITIONS", 16),
            sub_vectors: parse_env_or("WADDLE_VECTOR_SUBVECTORS", 8),
            search_nprobe: parse_env_or("WADDLE_VECTOR_NPROBE", 8),
            batch_size: parse_env_or("WADDLE_VECTOR_BATCH_SIZE", 32),
            batch_timeout: Duration::from_millis(parse_env_or(
                "WADDLE_VECTOR_BATCH_TIMEOUT_MS",
                500,
            )),
            root: data_dir.join("vectors"),
        }
    }
}
