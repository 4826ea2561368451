use crate::fault::isolate;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token returned by a subscription, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Multiple independent subscribers to one event.
///
/// A panicking subscriber is logged and skipped; the rest still receive the value.
pub struct ObserverList<T: ?Sized> {
    name: &'static str,
    next_id: Arc<AtomicU64>,
    observers: RwLock<Vec<(SubscriptionId, Observer<T>)>>,
}

impl<T: ?Sized> ObserverList<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: Arc::new(AtomicU64::new(1)),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// A list whose ids never collide with the ids handed out by `other`.
    pub fn sharing_ids_with<U: ?Sized>(name: &'static str, other: &ObserverList<U>) -> Self {
        Self {
            name,
            next_id: other.next_id.clone(),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Deliver `value` to every subscriber. Returns how many ran without faulting.
    pub fn notify(&self, value: &T) -> usize {
        // Snapshot so subscribers may (un)subscribe while being notified.
        let snapshot: Vec<Observer<T>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        snapshot
            .into_iter()
            .filter(|observer| isolate(self.name, || observer(value)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}
