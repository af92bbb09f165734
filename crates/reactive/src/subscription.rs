//! Subscription management for commit observers.
//!
//! This module provides subscription IDs and a manager for tracking
//! active subscriptions to a published value stream.

use alloc::boxed::Box;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for published values.
pub type ValueCallback<T> = Box<dyn Fn(&T)>;

/// A subscription to a published value stream.
pub struct Subscription<T> {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on publish
    callback: ValueCallback<T>,
    /// Whether this subscription is active
    active: bool,
}

impl<T> Subscription<T> {
    /// Creates a new subscription.
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&T) + 'static,
    {
        Self {
            id,
            callback: Box::new(callback),
            active: true,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivates this subscription.
    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Notifies this subscription of a published value.
    pub fn notify(&self, value: &T) {
        if self.active {
            (self.callback)(value);
        }
    }
}

/// Manages subscriptions for one published value stream.
pub struct SubscriptionManager<T> {
    /// Active subscriptions
    subscriptions: HashMap<SubscriptionId, Subscription<T>>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl<T> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriptionManager<T> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let subscription = Subscription::new(id, callback);
        self.subscriptions.insert(id, subscription);

        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Notifies a specific subscription.
    pub fn notify(&self, id: SubscriptionId, value: &T) {
        if let Some(sub) = self.subscriptions.get(&id) {
            sub.notify(value);
        }
    }

    /// Notifies all active subscriptions.
    pub fn notify_all(&self, value: &T) {
        for sub in self.subscriptions.values() {
            sub.notify(value);
        }
    }

    /// Returns the number of active subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns all subscription IDs.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.keys().copied().collect()
    }

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[test]
    fn test_subscription_new() {
        let sub: Subscription<i32> = Subscription::new(1, |_| {});
        assert_eq!(sub.id(), 1);
        assert!(sub.is_active());
    }

    #[test]
    fn test_subscription_notify_inactive() {
        let called = Rc::new(RefCell::new(false));
        let called_clone = called.clone();

        let mut sub: Subscription<i32> = Subscription::new(1, move |_| {
            *called_clone.borrow_mut() = true;
        });
        sub.deactivate();
        sub.notify(&1);

        assert!(!*called.borrow());
    }

    #[test]
    fn test_manager_subscribe_and_notify_all() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();

        let seen_clone = seen.clone();
        let first = manager.subscribe(move |v| seen_clone.borrow_mut().push(*v));
        let seen_clone = seen.clone();
        let _second = manager.subscribe(move |v| seen_clone.borrow_mut().push(*v * 10));

        manager.notify_all(&3);
        let mut got = seen.borrow().clone();
        got.sort_unstable();
        assert_eq!(got, [3, 30]);

        assert!(manager.unsubscribe(first));
        assert!(!manager.unsubscribe(first));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_manager_notify_by_id() {
        let seen = Rc::new(RefCell::new(0));
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();

        let seen_clone = seen.clone();
        let id = manager.subscribe(move |v| *seen_clone.borrow_mut() += *v);

        manager.notify(id, &5);
        manager.notify(999, &7);
        assert_eq!(*seen.borrow(), 5);
    }
}
