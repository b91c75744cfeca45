//! Deduplicating work queue keyed by object identity.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kubemon_core::ObjectKey;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Work queue with the guarantees the reconcilers rely on:
///
/// - a key is queued at most once at a time
/// - a key is handed to at most one worker at a time; adding it while it is
///   being processed marks it dirty and it is requeued when the worker calls
///   [`done`](Self::done)
/// - a key waits on at most one delayed add; a later
///   [`add_after`](Self::add_after) only wins if it is due earlier
/// - after [`shutdown`](Self::shutdown), [`next`](Self::next) returns `None`
///   and adds are ignored
#[derive(Clone)]
pub struct WorkQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    processing: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    /// Delayed adds by the time they are due.
    waiting: HashMap<ObjectKey, Instant>,
    shutdown: bool,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn add(&self, key: ObjectKey) {
        let Ok(mut state) = self.state.lock() else {
            tracing::error!("Work queue lock poisoned, dropping {}", key);
            return;
        };
        if state.shutdown || state.queued.contains(&key) {
            return;
        }
        if state.processing.contains(&key) {
            state.dirty.insert(key);
            return;
        }
        state.queued.insert(key.clone());
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Add `key` once `delay` has elapsed.
    ///
    /// If the key is already waiting and due no later than this, the call is
    /// a no-op. Otherwise the earlier due time replaces the pending one.
    pub fn add_after(&self, key: ObjectKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let due = Instant::now() + delay;
        {
            let Ok(mut state) = self.state.lock() else {
                tracing::error!("Work queue lock poisoned, dropping delayed {}", key);
                return;
            };
            if state.shutdown {
                return;
            }
            if state.waiting.get(&key).is_some_and(|pending| *pending <= due) {
                return;
            }
            state.waiting.insert(key.clone(), due);
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(due).await;
            queue.fire(key, due);
        });
    }

    /// Timer callback. A timer superseded by an earlier one does nothing.
    fn fire(&self, key: ObjectKey, due: Instant) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.waiting.get(&key) != Some(&due) {
                return;
            }
            state.waiting.remove(&key);
        }
        self.add(key);
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    pub async fn next(&self) -> Option<ObjectKey> {
        loop {
            // Registered before checking so a concurrent shutdown is not missed.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().ok()?;
                if state.shutdown {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.queued.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark `key` as no longer being processed.
    pub fn done(&self, key: &ObjectKey) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.processing.remove(key);
        if state.dirty.remove(key) && !state.shutdown {
            state.queued.insert(key.clone());
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub fn shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.shutdown = true;
            state.waiting.clear();
        }
        self.notify.notify_waiters();
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys waiting on a delayed add.
    pub fn delayed_len(&self) -> usize {
        self.state.lock().map(|s| s.waiting.len()).unwrap_or(0)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    #[tokio::test]
    async fn deduplicates_queued_keys() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        queue.add(key("a"));
        queue.add(key("b"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next().await, Some(key("a")));
        assert_eq!(queue.next().await, Some(key("b")));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn key_in_flight_is_requeued_on_done() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        let taken = queue.next().await.unwrap();

        queue.add(key("a"));
        assert!(queue.is_empty(), "in-flight key must not be handed out twice");

        queue.done(&taken);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next().await, Some(key("a")));
    }

    #[tokio::test]
    async fn delayed_add_arrives() {
        let queue = WorkQueue::new();
        queue.add_after(key("later"), Duration::from_millis(20));
        assert!(queue.is_empty());

        let next = tokio::time::timeout(Duration::from_secs(2), queue.next())
            .await
            .unwrap();
        assert_eq!(next, Some(key("later")));
    }

    #[tokio::test]
    async fn repeated_delayed_adds_share_one_timer() {
        let queue = WorkQueue::new();
        queue.add_after(key("battle"), Duration::from_millis(30));
        queue.add_after(key("battle"), Duration::from_millis(30));
        queue.add_after(key("battle"), Duration::from_millis(60));
        assert_eq!(queue.delayed_len(), 1);

        let first = tokio::time::timeout(Duration::from_secs(2), queue.next())
            .await
            .unwrap()
            .unwrap();
        queue.done(&first);
        assert_eq!(queue.delayed_len(), 0);

        // Nothing else was scheduled for the key.
        let second = tokio::time::timeout(Duration::from_millis(200), queue.next()).await;
        assert!(second.is_err(), "key delivered twice");
    }

    #[tokio::test]
    async fn earlier_delayed_add_wins() {
        let queue = WorkQueue::new();
        queue.add_after(key("battle"), Duration::from_secs(30));
        queue.add_after(key("battle"), Duration::from_millis(10));

        let next = tokio::time::timeout(Duration::from_secs(2), queue.next())
            .await
            .unwrap();
        assert_eq!(next, Some(key("battle")));
        assert_eq!(queue.delayed_len(), 0);
    }

    #[tokio::test]
    async fn shutdown_wakes_waiters() {
        let queue = WorkQueue::new();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };
        tokio::task::yield_now().await;

        queue.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, None);

        queue.add(key("ignored"));
        assert!(queue.is_empty());
    }
}
