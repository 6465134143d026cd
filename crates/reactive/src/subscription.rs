//! Subscription management for live queries.
//!
//! This module provides subscription IDs and a manager for tracking the result
//! callbacks attached to one query.

use crate::change_set::ChangeSet;
use hashbrown::HashMap;
use std::sync::Arc;

/// Unique identifier for a subscription within a query.
pub type SubscriptionId = u64;

/// Callback type for result notifications.
///
/// Callbacks are shared so they can be invoked after the engine state lock is
/// released.
pub type ChangeCallback = Arc<dyn Fn(&ChangeSet) + Send + Sync>;

/// A subscription to query results.
pub struct Subscription {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on changes
    callback: ChangeCallback,
}

impl Subscription {
    /// Creates a new subscription.
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        Self {
            id,
            callback: Arc::new(callback),
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns a shared handle to the callback.
    #[inline]
    pub fn callback(&self) -> ChangeCallback {
        self.callback.clone()
    }
}

/// Manages the subscriptions of one query.
pub struct SubscriptionManager {
    /// Active subscriptions
    subscriptions: HashMap<SubscriptionId, Subscription>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes to changes with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription::new(id, callback));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Returns the callback of one subscription.
    pub fn callback(&self, id: SubscriptionId) -> Option<ChangeCallback> {
        self.subscriptions.get(&id).map(Subscription::callback)
    }

    /// Returns all callbacks in subscription order.
    pub fn callbacks(&self) -> Vec<ChangeCallback> {
        let mut subs: Vec<&Subscription> = self.subscriptions.values().collect();
        subs.sort_by_key(|s| s.id);
        subs.into_iter().map(Subscription::callback).collect()
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

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
