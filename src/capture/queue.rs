// src/capture/queue.rs
// Bounded, drop-oldest queue shared between adjacent pipeline stages. A plain
// `tokio::sync::mpsc` channel cannot implement "drop the oldest queued item on
// overflow" (its receiver, not its sender, owns the buffer), so this is a
// small ring buffer behind a mutex + `Notify`, matching the design note's
// backpressure policy exactly.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

struct Inner<T> {
    buffer: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    closed: std::sync::atomic::AtomicBool,
    dropped: AtomicU64,
    len: AtomicUsize,
}

/// Cloneable handle onto a shared bounded queue. Push drops the oldest
/// element when full rather than blocking; pop waits for an element or for
/// the queue to close.
pub struct DropOldestQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DropOldestQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                notify: Notify::new(),
                closed: std::sync::atomic::AtomicBool::new(false),
                dropped: AtomicU64::new(0),
                len: AtomicUsize::new(0),
            }),
        }
    }

    /// Push an item; if the queue is at capacity, drops the oldest queued
    /// item first and increments the dropped-events counter.
    pub fn push(&self, item: T) {
        {
            let mut buf = self.inner.buffer.lock();
            if buf.len() >= self.inner.capacity {
                buf.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(queue_capacity = self.inner.capacity, "queue full, dropped oldest item");
            }
            buf.push_back(item);
            self.inner.len.store(buf.len(), Ordering::Relaxed);
        }
        self.inner.notify.notify_one();
    }

    /// Waits for an item, or returns `None` once the queue is closed and
    /// drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut buf = self.inner.buffer.lock();
                if let Some(item) = buf.pop_front() {
                    self.inner.len.store(buf.len(), Ordering::Relaxed);
                    return Some(item);
                }
                if self.inner.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drops_oldest_when_full() {
        let q: DropOldestQueue<i32> = DropOldestQueue::new(2);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.pop().await, Some(2));
        assert_eq!(q.pop().await, Some(3));
    }

    #[tokio::test]
    async fn pop_returns_none_after_close_and_drain() {
        let q: DropOldestQueue<i32> = DropOldestQueue::new(4);
        q.push(1);
        q.close();
        assert_eq!(q.pop().await, Some(1));
        assert_eq!(q.pop().await, None);
    }
}
