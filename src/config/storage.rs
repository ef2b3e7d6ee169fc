// src/config/storage.rs

use super::parse_env_or;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub db_busy_timeout: Duration,
    pub retention_days: i64,
    pub fts_enabled: bool,
    pub blob_root: PathBuf,
}

impl StorageConfig {
    pub fn from_env(data_dir: &Path) -> Self {
        Self {
            db_busy_timeout: Duration::from_secs(parse_env_or("WADDLE_DB_BUSY_TIMEOUT_SECS", 5)),
            retention_days: parse_env_or("WADDLE_RETENTION_DAYS", 365),
            fts_enabled: true,
            blob_root: data_dir.join("files"),
        }
    }
}
