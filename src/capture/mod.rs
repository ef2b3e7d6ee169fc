// src/capture/mod.rs
// Three-stage capture pipeline (focus ingest -> structured extraction -> OCR
// batch) feeding the Storage Engine. See `pipeline.rs` for the wiring.

mod accessibility;
mod focus;
mod ocr;
mod pipeline;
mod queue;

pub use accessibility::{
    AccessibilityBackend, AccessibilityQuery, AccessibilityReader, FakeAccessibilityReader,
    NullAccessibilityBackend, StructuredQueryResult, ThreadedAccessibilityReader,
};
pub use focus::{FocusEvent, FocusSource, NullFocusSource, ScriptedFocusSource};
pub use ocr::{FakeOcrClient, NullOcrClient, OcrClient};
pub use pipeline::{BlockDescriptor, CapturePipeline, PipelineStats};
pub use queue::DropOldestQueue;
