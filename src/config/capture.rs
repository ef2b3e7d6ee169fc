// src/config/capture.rs

use super::parse_env_or;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub stage1_queue_capacity: usize,
    pub stage2_queue_capacity: usize,
    pub ocr_batch_size: usize,
    pub ocr_batch_timeout: Duration,
    pub accessibility_send_timeout: Duration,
    pub accessibility_recv_timeout: Duration,
    pub shutdown_grace_period: Duration,
}

impl CaptureConfig {
    pub fn from_env() -> Self {
        Self {
            stage1_queue_capacity: parse_env_or("WADDLE_STAGE1_QUEUE", 1000),
            stage2_queue_capacity: parse_env_or("WADDLE_STAGE2_QUEUE", 100),
            ocr_batch_size: parse_env_or("WADDLE_OCR_BATCH_SIZE", 10),
            ocr_batch_timeout: Duration::from_millis(parse_env_or(
                "WADDLE_OCR_BATCH_TIMEOUT_MS",
                500,
            )),
            accessibility_send_timeout: Duration::from_secs(parse_env_or(
                "WADDLE_ACCESSIBILITY_SEND_TIMEOUT_SECS",
                5,
            )),
            accessibility_recv_timeout: Duration::from_secs(parse_env_or(
                "WADDLE_ACCESSIBILITY_RECV_TIMEOUT_SECS",
                10,
            )),
            shutdown_grace_period: Duration::from_secs(parse_env_or(
                "WADDLE_SHUTDOWN_GRACE_SECS",
                5,
            )),
        }
    }
}
