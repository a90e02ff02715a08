//! Bounded inbound queue shared by every hub connection.
//!
//! Producers (connection read loops) never block: when the queue is full
//! the oldest droppable item is discarded and counted. Items that must not
//! be lost, such as full snapshots, are never chosen for dropping.

use isy_api::HubSnapshot;
use isy_parser::HubEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

use crate::state::{ConnectionState, HubId};

/// Whether an item may be discarded under backpressure
pub trait Droppable {
    fn is_droppable(&self) -> bool;
}

/// Where a connection delivers what it reads.
///
/// Calls must return promptly; they run on the read loop.
pub trait EventSink: Send + Sync + 'static {
    /// A complete state snapshot, delivered before streaming starts
    fn snapshot(&self, hub: &HubId, snapshot: HubSnapshot);
    fn event(&self, hub: &HubId, event: HubEvent);
    fn state_changed(&self, hub: &HubId, state: ConnectionState);
}

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

/// Multi-producer, single-consumer drop-oldest queue
pub struct InboundQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for InboundQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Droppable> InboundQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
                capacity: capacity.max(1),
                notify: Notify::new(),
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue without blocking. Returns `false` once the queue is closed.
    pub fn push(&self, item: T) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }

        let dropped_now = {
            let mut items = self.inner.items.lock();
            let mut dropped = false;
            if items.len() >= self.inner.capacity {
                if let Some(index) = items.iter().position(Droppable::is_droppable) {
                    items.remove(index);
                    dropped = true;
                }
            }
            items.push_back(item);
            dropped
        };

        if dropped_now {
            let total = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                dropped_total = total,
                capacity = self.inner.capacity,
                "Inbound queue full, dropped oldest event"
            );
        }

        self.inner.notify.notify_one();
        true
    }

    /// Wait for the next item. `None` once closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            if let Some(item) = self.inner.items.lock().pop_front() {
                return Some(item);
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return None;
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner.items.lock().pop_front()
    }

    /// Stop accepting items and wake the consumer
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Items discarded under backpressure since creation
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Item {
        Event(u32),
        Snapshot(u32),
    }

    impl Droppable for Item {
        fn is_droppable(&self) -> bool {
            matches!(self, Item::Event(_))
        }
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let queue = InboundQueue::new(3);
        for i in 0..5 {
            assert!(queue.push(Item::Event(i)));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped_count(), 2);
        assert_eq!(queue.try_pop(), Some(Item::Event(2)));
        assert_eq!(queue.try_pop(), Some(Item::Event(3)));
        assert_eq!(queue.try_pop(), Some(Item::Event(4)));
    }

    #[test]
    fn test_snapshots_are_never_dropped() {
        let queue = InboundQueue::new(2);
        queue.push(Item::Snapshot(0));
        queue.push(Item::Event(1));
        queue.push(Item::Event(2));
        queue.push(Item::Snapshot(3));

        assert_eq!(queue.dropped_count(), 2);
        assert_eq!(queue.try_pop(), Some(Item::Snapshot(0)));
        assert_eq!(queue.try_pop(), Some(Item::Snapshot(3)));
        assert_eq!(queue.try_pop(), None);
    }

    #[rstest]
    #[case::zero_capacity_holds_one(0, vec![Item::Event(0), Item::Event(1)], 1, vec![Item::Event(1)])]
    #[case::full_of_snapshots_grows(1, vec![Item::Snapshot(0), Item::Snapshot(1)], 0, vec![Item::Snapshot(0), Item::Snapshot(1)])]
    #[case::drops_event_behind_snapshot(2, vec![Item::Snapshot(0), Item::Event(1), Item::Event(2)], 1, vec![Item::Snapshot(0), Item::Event(2)])]
    #[case::under_capacity(4, vec![Item::Event(0), Item::Snapshot(1)], 0, vec![Item::Event(0), Item::Snapshot(1)])]
    fn test_backpressure_edges(
        #[case] capacity: usize,
        #[case] pushed: Vec<Item>,
        #[case] dropped: u64,
        #[case] remaining: Vec<Item>,
    ) {
        let queue = InboundQueue::new(capacity);
        for item in pushed {
            assert!(queue.push(item));
        }
        assert_eq!(queue.dropped_count(), dropped);
        let drained: Vec<Item> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(drained, remaining);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = InboundQueue::new(8);
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(Item::Event(7));
        assert_eq!(consumer.await.unwrap(), Some(Item::Event(7)));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = InboundQueue::new(8);
        queue.push(Item::Event(1));
        queue.close();

        assert!(!queue.push(Item::Event(2)));
        assert_eq!(queue.pop().await, Some(Item::Event(1)));
        assert_eq!(queue.pop().await, None);
    }
}
