//! Per-table commit observers.
//!
//! A `TableObserver` buffers the operations applied to one table during a
//! transaction and publishes them to subscribers at commit. Publication is
//! driven from outside, one operation at a time, so a database holding many
//! tables can interleave the per-table queues into the chronological
//! cross-table order.

use alloc::collections::VecDeque;
use core::cell::RefCell;

use tabula_core::{Error, Operation, Result};

use crate::subscription::{SubscriptionId, SubscriptionManager};

/// Buffers applied operations and fans them out to subscribers at commit.
pub struct TableObserver<V> {
    queue: RefCell<VecDeque<Operation<V>>>,
    subscriptions: RefCell<SubscriptionManager<Operation<V>>>,
}

impl<V> Default for TableObserver<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TableObserver<V> {
    /// Creates an observer with empty queue and no subscribers.
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            subscriptions: RefCell::new(SubscriptionManager::new()),
        }
    }

    /// Enqueues an applied operation for publication at commit.
    pub fn enqueue(&self, operation: Operation<V>) {
        self.queue.borrow_mut().push_back(operation);
    }

    /// Publishes the oldest queued operation to every subscriber.
    ///
    /// The caller drives publication in cross-table chronological order, so
    /// an empty queue here means the order bookkeeping is corrupt.
    pub fn publish_next(&self) -> Result<()> {
        let operation = self
            .queue
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::invalid_operation("no queued operation to publish"))?;
        self.subscriptions.borrow().notify_all(&operation);
        Ok(())
    }

    /// Drops every queued operation without publishing.
    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }

    /// Returns the number of queued operations.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Subscribes to published operations.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Operation<V>) + 'static,
    {
        self.subscriptions.borrow_mut().subscribe(callback)
    }

    /// Removes a subscription; returns true when it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow_mut().unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn test_publish_in_enqueue_order() {
        let observer: TableObserver<i32> = TableObserver::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        observer.subscribe(move |op| {
            if let Operation::Insert(v) = op {
                seen_clone.borrow_mut().push(*v);
            }
        });

        observer.enqueue(Operation::Insert(1));
        observer.enqueue(Operation::Insert(2));
        observer.enqueue(Operation::Insert(3));
        assert_eq!(observer.queued(), 3);

        observer.publish_next().unwrap();
        observer.publish_next().unwrap();
        observer.publish_next().unwrap();
        assert_eq!(*seen.borrow(), [1, 2, 3]);

        let err = observer.publish_next().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[test]
    fn test_clear_drops_queue_without_publishing() {
        let observer: TableObserver<i32> = TableObserver::new();
        let seen = Rc::new(RefCell::new(0));

        let seen_clone = seen.clone();
        observer.subscribe(move |_| *seen_clone.borrow_mut() += 1);

        observer.enqueue(Operation::Insert(1));
        observer.enqueue(Operation::Remove(1));
        observer.clear();

        assert_eq!(observer.queued(), 0);
        assert_eq!(*seen.borrow(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let observer: TableObserver<i32> = TableObserver::new();
        let seen = Rc::new(RefCell::new(0));

        let seen_clone = seen.clone();
        let id = observer.subscribe(move |_| *seen_clone.borrow_mut() += 1);

        observer.enqueue(Operation::Insert(1));
        observer.publish_next().unwrap();
        assert_eq!(*seen.borrow(), 1);

        assert!(observer.unsubscribe(id));
        observer.enqueue(Operation::Insert(2));
        observer.publish_next().unwrap();
        assert_eq!(*seen.borrow(), 1);
    }
}
