//! Fan-out of change events to open subscriptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use super::{lock, ChangeFilter, Subscription, SubscriptionHandle};
use crate::types::change::ChangeEvent;

struct Subscriber {
    filter: ChangeFilter,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

/// Registry of change subscribers keyed by handle.
#[derive(Default)]
pub struct ChangeFeed {
    next_handle: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionHandle, Subscriber>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and returns its handle and event stream.
    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, events) = mpsc::unbounded_channel();
        self.registry().insert(handle, Subscriber { filter, sender });
        debug!(handle = handle.0, "change subscriber registered");
        Subscription { handle, events }
    }

    /// Drops the subscriber, which closes its stream. Returns whether it was registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self.registry().remove(&handle).is_some();
        if removed {
            debug!(handle = handle.0, "change subscriber removed");
        }
        removed
    }

    /// Delivers `event` to every subscriber whose filter matches it.
    ///
    /// Subscribers whose receiving side has gone away are pruned.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut subscribers = self.registry();
        let mut delivered = 0;
        subscribers.retain(|handle, sub| {
            if !sub.filter.matches(event) {
                return !sub.sender.is_closed();
            }
            match sub.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(handle = handle.0, "pruning closed change subscriber");
                    false
                }
            }
        });
        delivered
    }

    pub fn active_subscriptions(&self) -> usize {
        self.registry().len()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<SubscriptionHandle, Subscriber>> {
        lock(&self.subscribers)
    }
}
