//! FIFO buffer between an ingestion source and the consumer.
//!
//! Producers [`enqueue`](Queue::enqueue) from any task; the consumer drains
//! everything at once with [`dequeue_all`](Queue::dequeue_all). Waiting for
//! input is notification-driven: [`wait_for_input`](Queue::wait_for_input)
//! wakes on the next enqueue instead of polling, and a producer can
//! [`wait_until_empty`](Queue::wait_until_empty) to hand over one batch at
//! a time.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

pub struct Queue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    drained: Notify,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            drained: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `items` in iteration order.
    pub fn enqueue(&self, items: impl IntoIterator<Item = T>) {
        let added = {
            let mut queue = self.lock();
            let before = queue.len();
            queue.extend(items);
            queue.len() > before
        };
        if added {
            self.notify.notify_one();
        }
    }

    /// Remove and return the oldest item.
    pub fn dequeue(&self) -> Option<T> {
        let (item, empty) = {
            let mut queue = self.lock();
            let item = queue.pop_front();
            (item, queue.is_empty())
        };
        if empty {
            self.drained.notify_one();
        }
        item
    }

    /// Remove and return every buffered item, oldest first.
    pub fn dequeue_all(&self) -> Vec<T> {
        let items = std::mem::take(&mut *self.lock());
        self.drained.notify_one();
        items.into()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wait until the queue holds at least one item.
    ///
    /// Returns `false` if `max_inactivity` elapses first. `None` waits
    /// forever.
    pub async fn wait_for_input(&self, max_inactivity: Option<Duration>) -> bool {
        let ready = async {
            while self.is_empty() {
                self.notify.notified().await;
            }
        };
        match max_inactivity {
            Some(limit) => tokio::time::timeout(limit, ready).await.is_ok(),
            None => {
                ready.await;
                true
            }
        }
    }

    /// Wait until a consumer has taken everything that was enqueued.
    pub async fn wait_until_empty(&self) {
        while !self.is_empty() {
            self.drained.notified().await;
        }
    }
}

impl<T: Clone> Queue<T> {
    /// The oldest item, without removing it.
    pub fn head(&self) -> Option<T> {
        self.lock().front().cloned()
    }

    /// The newest item, without removing it.
    pub fn tail(&self) -> Option<T> {
        self.lock().back().cloned()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = Queue::new();
        queue.enqueue([1, 2]);
        queue.enqueue([3]);
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_dequeue_all_empties() {
        let queue = Queue::new();
        queue.enqueue(["a", "b", "c"]);
        assert_eq!(queue.dequeue_all(), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
        assert!(queue.dequeue_all().is_empty());
    }

    #[test]
    fn test_head_tail_do_not_mutate() {
        let queue = Queue::new();
        assert_eq!(queue.head(), None::<i32>);
        queue.enqueue([1, 2, 3]);
        assert_eq!(queue.head(), Some(1));
        assert_eq!(queue.tail(), Some(3));
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_not_empty() {
        let queue = Queue::new();
        queue.enqueue([1]);
        assert!(queue.wait_for_input(Some(Duration::from_millis(10))).await);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let queue: Queue<i32> = Queue::new();
        assert!(!queue.wait_for_input(Some(Duration::from_millis(20))).await);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_enqueue() {
        let queue = Arc::new(Queue::new());
        let producer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue([42]);
        });
        assert!(queue.wait_for_input(Some(Duration::from_secs(5))).await);
        assert_eq!(queue.dequeue(), Some(42));
    }

    #[tokio::test]
    async fn test_wait_until_empty_wakes_on_dequeue() {
        let queue = Arc::new(Queue::new());
        queue.enqueue([1, 2]);
        let consumer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            consumer.dequeue_all()
        });
        tokio::time::timeout(Duration::from_secs(5), queue.wait_until_empty())
            .await
            .unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_enqueue_does_not_wake() {
        let queue: Queue<i32> = Queue::new();
        queue.enqueue(Vec::new());
        assert!(!queue.wait_for_input(Some(Duration::from_millis(20))).await);
    }
}
