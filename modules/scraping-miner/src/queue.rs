//! Async max-priority queue shared between the axon and plugin workers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::sync::{Mutex, Notify};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,
}

struct Prioritized<T> {
    priority: u64,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Prioritized<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl<T> Eq for Prioritized<T> {}

impl<T> PartialOrd for Prioritized<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Prioritized<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then earlier insertion first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct Heap<T> {
    items: BinaryHeap<Prioritized<T>>,
    next_sequence: u64,
}

/// Highest priority is served first; equal priorities are served in
/// insertion order.
pub struct AsyncPriorityQueue<T> {
    inner: Mutex<Heap<T>>,
    notify: Notify,
}

impl<T> Default for AsyncPriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncPriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Heap {
                items: BinaryHeap::new(),
                next_sequence: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub async fn put(&self, priority: u64, item: T) {
        let mut heap = self.inner.lock().await;
        let sequence = heap.next_sequence;
        heap.next_sequence += 1;
        heap.items.push(Prioritized {
            priority,
            sequence,
            item,
        });
        drop(heap);
        self.notify.notify_one();
    }

    /// Wait until an item is available and remove it.
    pub async fn get(&self) -> T {
        loop {
            if let Ok(item) = self.try_get().await {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub async fn try_get(&self) -> Result<T, QueueError> {
        self.inner
            .lock()
            .await
            .items
            .pop()
            .map(|p| p.item)
            .ok_or(QueueError::Empty)
    }

    pub async fn qsize(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    pub async fn empty(&self) -> bool {
        self.qsize().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn highest_priority_first() {
        let q = AsyncPriorityQueue::new();
        q.put(1, "low").await;
        q.put(100, "high").await;
        q.put(10, "mid").await;

        assert_eq!(q.get().await, "high");
        assert_eq!(q.get().await, "mid");
        assert_eq!(q.get().await, "low");
    }

    #[tokio::test]
    async fn equal_priorities_are_fifo() {
        let q = AsyncPriorityQueue::new();
        for i in 0..5 {
            q.put(7, i).await;
        }
        for i in 0..5 {
            assert_eq!(q.get().await, i);
        }
    }

    #[tokio::test]
    async fn try_get_on_empty_queue_errors() {
        let q: AsyncPriorityQueue<u8> = AsyncPriorityQueue::new();
        assert!(q.empty().await);
        assert_eq!(q.try_get().await, Err(QueueError::Empty));

        q.put(0, 1).await;
        assert_eq!(q.qsize().await, 1);
        assert_eq!(q.try_get().await, Ok(1));
    }

    #[tokio::test]
    async fn get_waits_for_put() {
        let q = Arc::new(AsyncPriorityQueue::new());
        let consumer = tokio::spawn({
            let q = q.clone();
            async move { q.get().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        q.put(3, "late").await;
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, "late");
    }
}
