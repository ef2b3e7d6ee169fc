// src/synthesis/mod.rs
// Background enrichment: entity extraction and summarization over sessions
// not yet synthesized, fed by the Storage Engine's pending-synthesis queue.

mod entities;
mod summarizer;
mod worker;

pub use entities::extract_entities;
pub use summarizer::{ensure_three_bullets, LocalFallbackSummarizer, Summarizer};
pub use worker::SynthesisWorker;
