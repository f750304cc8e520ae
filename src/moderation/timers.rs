//! Keyed one-shot timers backed by tokio tasks

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;

/// At most one pending task per key; scheduling again replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    entries: Arc<DashMap<u64, (u64, AbortHandle)>>,
    generation: Arc<AtomicU64>,
}

impl Timers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` unless cancelled or replaced first
    pub fn schedule<F>(&self, key: u64, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let entries = Arc::clone(&self.entries);

        // The shard stays locked until the handle is stored, so a task that
        // fires immediately can't miss its own entry.
        let slot = self.entries.entry(key);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            entries.remove_if(&key, |_, (g, _)| *g == generation);
            task.await;
        });

        let value = (generation, handle.abort_handle());
        match slot {
            Entry::Occupied(mut occupied) => {
                let (_, previous) = occupied.insert(value);
                previous.abort();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
        }
    }

    /// Abort the pending task for `key`. Returns whether one existed.
    pub fn cancel(&self, key: u64) -> bool {
        self.entries
            .remove(&key)
            .map(|(_, (_, handle))| handle.abort())
            .is_some()
    }

    #[must_use]
    pub fn is_scheduled(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_fires_and_clears_entry() {
        let timers = Timers::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        timers.schedule(1, Duration::from_millis(10), async move {
            tx.send(1).unwrap();
        });
        assert!(timers.is_scheduled(1));

        assert_eq!(rx.recv().await, Some(1));
        assert!(!timers.is_scheduled(1));
    }

    #[tokio::test]
    async fn test_reschedule_replaces_previous() {
        let timers = Timers::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = tx.clone();
        timers.schedule(7, Duration::from_millis(20), async move {
            first.send("first").unwrap();
        });
        timers.schedule(7, Duration::from_millis(40), async move {
            tx.send("second").unwrap();
        });
        assert_eq!(timers.len(), 1);

        assert_eq!(rx.recv().await, Some("second"));
        // Every sender is gone once the replaced task was aborted
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_cancel() {
        let timers = Timers::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        timers.schedule(3, Duration::from_millis(10), async move {
            tx.send(()).unwrap();
        });
        assert!(timers.cancel(3));
        assert!(!timers.cancel(3));
        assert!(timers.is_empty());
        assert_eq!(rx.recv().await, None);
    }
}
