// src/config/mod.rs
// Central configuration for the Waddle core.

pub mod capture;
pub mod crypto;
pub mod storage;
pub mod synthesis;
pub mod vector;

use lazy_static::lazy_static;
use std::path::PathBuf;

lazy_static! {
    pub static ref CONFIG: WaddleConfig = WaddleConfig::from_env();
}

/// Top-level configuration, composed from one struct per concern.
#[derive(Debug, Clone)]
pub struct WaddleConfig {
    pub data_dir: PathBuf,
    pub crypto: crypto::CryptoConfig,
    pub storage: storage::StorageConfig,
    pub vector: vector::VectorConfig,
    pub capture: capture::CaptureConfig,
    pub synthesis: synthesis::SynthesisConfig,
}

impl WaddleConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let data_dir = std::env::var("WADDLE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("waddle")
            });

        Self {
            crypto: crypto::CryptoConfig::from_env(),
            storage: storage::StorageConfig::from_env(&data_dir),
            vector: vector::VectorConfig::from_env(&data_dir),
            capture: capture::CaptureConfig::from_env(),
            synthesis: synthesis::SynthesisConfig::from_env(),
            data_dir,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.vector.dimension == 0 {
            return Err("vector.dimension must be > 0".to_string());
        }
        if self.capture.stage1_queue_capacity == 0 || self.capture.stage2_queue_capacity == 0 {
            return Err("capture queue capacities must be > 0".to_string());
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("waddle.db")
    }

    pub fn blob_root(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    pub fn vector_root(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn backups_root(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) use env_or as parse_env_or;
