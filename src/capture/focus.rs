// src/capture/focus.rs
// Stage 1's external collaborator: an OS-level focus-event source. The real
// implementation (platform event subscription with a polling fallback) is a
// platform-specific shim and out of scope; this is the trait seam plus a
// deterministic in-memory fake for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct FocusEvent {
    pub timestamp: DateTime<Utc>,
    pub window_handle: u64,
    pub process_id: u32,
    pub process_name: String,
}

#[async_trait]
pub trait FocusSource: Send + Sync {
    /// Returns the next focus event, or `None` once the source is exhausted
    /// (used in tests; a live source normally never returns `None`).
    async fn next_event(&self) -> Option<FocusEvent>;

    /// Whether this source is running in degraded polling mode rather than
    /// privileged event subscription — determines whether Stage 1 tags a
    /// descriptor `etw` or `polling`.
    fn is_fallback(&self) -> bool;
}

/// No platform backend wired in. Never yields an event, so Stage 1 stays
/// alive but idle rather than exiting immediately — the extension point a
/// real OS event subscription plugs into.
pub struct NullFocusSource;

#[async_trait]
impl FocusSource for NullFocusSource {
    async fn next_event(&self) -> Option<FocusEvent> {
        std::future::pending().await
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

/// Replays a fixed sequence of events, one per call, for deterministic tests.
pub struct ScriptedFocusSource {
    events: tokio::sync::Mutex<std::collections::VecDeque<FocusEvent>>,
    fallback: bool,
}

impl ScriptedFocusSource {
    pub fn new(events: Vec<FocusEvent>, fallback: bool) -> Self {
        Self {
            events: tokio::sync::Mutex::new(events.into()),
            fallback,
        }
    }
}

#[async_trait]
impl FocusSource for ScriptedFocusSource {
    async fn next_event(&self) -> Option<FocusEvent> {
        self.events.lock().await.pop_front()
    }

    fn is_fallback(&self) -> bool {
        self.fallback
    }
}
