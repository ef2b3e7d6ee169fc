// src/capture/ocr.rs
// Stage 3's external collaborator: batched optical-character-recognition.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Recognizes text in each image, preserving order. `None` for an image
    /// that yielded no text.
    async fn recognize_batch(&self, images: &[Vec<u8>]) -> Result<Vec<Option<String>>>;
}

/// No OCR engine wired in: every image yields no text. The extension point a
/// real recognition backend plugs into.
pub struct NullOcrClient;

#[async_trait]
impl OcrClient for NullOcrClient {
    async fn recognize_batch(&self, images: &[Vec<u8>]) -> Result<Vec<Option<String>>> {
        Ok(vec![None; images.len()])
    }
}

/// Deterministic fake for tests: returns a fixed string derived from each
/// image's length so behavior is reproducible without a real OCR engine.
pub struct FakeOcrClient;

#[async_trait]
impl OcrClient for FakeOcrClient {
    async fn recognize_batch(&self, images: &[Vec<u8>]) -> Result<Vec<Option<String>>> {
        Ok(images
            .iter()
            .map(|img| {
                if img.is_empty() {
                    None
                } else {
                    Some(format!("recognized {} bytes", img.len()))
                }
            })
            .collect())
    }
}
