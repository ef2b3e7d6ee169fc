// src/capture/accessibility.rs
// Stage 2's external collaborator: a platform accessibility reader. Real
// accessibility APIs on every desktop platform are single-threaded-apartment,
// so all queries are marshaled onto one dedicated OS thread; callers talk to
// it over a request/response channel with independent send/receive timeouts,
// exactly as the design note specifies.

use crate::error::{Result, WaddleError};
use async_trait::async_trait;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AccessibilityQuery {
    pub app: String,
    pub window_handle: u64,
}

#[derive(Debug, Clone)]
pub struct StructuredQueryResult {
    pub valid: bool,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait AccessibilityReader: Send + Sync {
    async fn query(&self, query: AccessibilityQuery) -> Result<StructuredQueryResult>;
}

/// The blocking, platform-specific half of the reader. Runs entirely on the
/// dedicated thread; never touched from async code directly.
pub trait AccessibilityBackend: Send {
    fn query_blocking(&mut self, query: &AccessibilityQuery) -> Result<StructuredQueryResult>;
}

struct Request {
    query: AccessibilityQuery,
    respond_to: oneshot::Sender<Result<StructuredQueryResult>>,
}

/// Marshals queries onto one dedicated OS thread. Requests not yet delivered
/// to the thread at shutdown time are answered with a shutting-down error;
/// queries submitted after shutdown are rejected immediately.
pub struct ThreadedAccessibilityReader {
    request_tx: std_mpsc::Sender<Request>,
    closed: Arc<AtomicBool>,
    send_timeout: Duration,
    recv_timeout: Duration,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ThreadedAccessibilityReader {
    pub fn spawn(
        mut backend: Box<dyn AccessibilityBackend>,
        send_timeout: Duration,
        recv_timeout: Duration,
    ) -> Self {
        let (request_tx, request_rx) = std_mpsc::channel::<Request>();
        let closed = Arc::new(AtomicBool::new(false));
        let thread_closed = closed.clone();

        let thread = std::thread::Builder::new()
            .name("waddle-accessibility".to_string())
            .spawn(move || {
                for request in request_rx {
                    if thread_closed.load(Ordering::SeqCst) {
                        let _ = request
                            .respond_to
                            .send(Err(WaddleError::Validation("accessibility reader shutting down".to_string())));
                        continue;
                    }
                    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        backend.query_blocking(&request.query)
                    }))
                    .unwrap_or_else(|_| {
                        Err(WaddleError::Validation(
                            "accessibility backend panicked".to_string(),
                        ))
                    });
                    let _ = request.respond_to.send(result);
                }
            })
            .expect("failed to spawn accessibility thread");

        Self {
            request_tx,
            closed,
            send_timeout,
            recv_timeout,
            thread: Some(thread),
        }
    }

    /// Signal the dedicated thread to answer everything still queued with a
    /// shutting-down error, then join it.
    pub fn shutdown(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        drop(std::mem::replace(&mut self.request_tx, std_mpsc::channel().0));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[async_trait]
impl AccessibilityReader for ThreadedAccessibilityReader {
    async fn query(&self, query: AccessibilityQuery) -> Result<StructuredQueryResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WaddleError::Validation(
                "accessibility reader shutting down".to_string(),
            ));
        }

        let (respond_to, response_rx) = oneshot::channel();
        let request_tx = self.request_tx.clone();
        let send_result = tokio::time::timeout(
            self.send_timeout,
            tokio::task::spawn_blocking(move || request_tx.send(Request { query, respond_to })),
        )
        .await;

        match send_result {
            Err(_) => return Err(WaddleError::Validation("accessibility request send timed out".to_string())),
            Ok(Err(join_err)) => return Err(WaddleError::Validation(format!("accessibility send task failed: {join_err}"))),
            Ok(Ok(Err(_))) => {
                return Err(WaddleError::Validation(
                    "accessibility reader thread is gone".to_string(),
                ))
            }
            Ok(Ok(Ok(()))) => {}
        }

        match tokio::time::timeout(self.recv_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(WaddleError::Validation(
                "accessibility reader dropped the response channel".to_string(),
            )),
            Err(_) => Err(WaddleError::Validation(
                "accessibility response timed out".to_string(),
            )),
        }
    }
}

impl Drop for ThreadedAccessibilityReader {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}

/// No platform backend wired in: every query reports "no structured data",
/// so Stage 2 always falls through to OCR. The extension point a real
/// accessibility API implementation plugs into via [`AccessibilityBackend`].
pub struct NullAccessibilityBackend;

impl AccessibilityBackend for NullAccessibilityBackend {
    fn query_blocking(&mut self, _query: &AccessibilityQuery) -> Result<StructuredQueryResult> {
        Ok(StructuredQueryResult {
            valid: false,
            metadata: serde_json::Value::Null,
        })
    }
}

/// Deterministic in-memory reader for tests: apps in `valid_apps` always
/// return a valid structured result, everything else is invalid.
pub struct FakeAccessibilityReader {
    pub valid_apps: Vec<String>,
}

#[async_trait]
impl AccessibilityReader for FakeAccessibilityReader {
    async fn query(&self, query: AccessibilityQuery) -> Result<StructuredQueryResult> {
        if self.valid_apps.contains(&query.app) {
            Ok(StructuredQueryResult {
                valid: true,
                metadata: serde_json::json!({ "app": query.app, "window_handle": query.window_handle }),
            })
        } else {
            Ok(StructuredQueryResult {
                valid: false,
                metadata: serde_json::Value::Null,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBackend;
    impl AccessibilityBackend for EchoBackend {
        fn query_blocking(&mut self, query: &AccessibilityQuery) -> Result<StructuredQueryResult> {
            Ok(StructuredQueryResult {
                valid: query.app == "VSCode",
                metadata: serde_json::json!({ "app": query.app }),
            })
        }
    }

    struct PanickingBackend;
    impl AccessibilityBackend for PanickingBackend {
        fn query_blocking(&mut self, _query: &AccessibilityQuery) -> Result<StructuredQueryResult> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn marshals_query_to_dedicated_thread() {
        let reader = ThreadedAccessibilityReader::spawn(
            Box::new(EchoBackend),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );
        let result = reader
            .query(AccessibilityQuery {
                app: "VSCode".to_string(),
                window_handle: 1,
            })
            .await
            .unwrap();
        assert!(result.valid);
    }

    #[tokio::test]
    async fn backend_panic_is_delivered_as_error() {
        let reader = ThreadedAccessibilityReader::spawn(
            Box::new(PanickingBackend),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );
        let result = reader
            .query(AccessibilityQuery {
                app: "Anything".to_string(),
                window_handle: 1,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn query_after_shutdown_is_rejected() {
        let mut reader = ThreadedAccessibilityReader::spawn(
            Box::new(EchoBackend),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );
        reader.shutdown();
        let result = reader
            .query(AccessibilityQuery {
                app: "VSCode".to_string(),
                window_handle: 1,
            })
            .await;
        assert!(result.is_err());
    }
}
