//! Dependency records.
//!
//! Every reactive source (a `State`, or the output side of a `Computed`)
//! owns one `Dep`: the ordered set of subscribers to notify when the source
//! changes. Effects hold the reverse edge as a `Weak<Dep>` so that tearing
//! down an effect's subscriptions never keeps a source alive.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{Subscriber, SubscriberId};

/// Unique identifier for a dependency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) struct Dep {
    id: DepId,
    subscribers: RefCell<IndexMap<SubscriberId, Subscriber>>,
}

impl Dep {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            id: DepId::next(),
            subscribers: RefCell::new(IndexMap::new()),
        })
    }

    pub(crate) fn id(&self) -> DepId {
        self.id
    }

    /// Register the running effect (if any) as a subscriber.
    pub(crate) fn track(self: &Rc<Self>) {
        if let Some(effect) = ReactiveContext::current_effect() {
            effect.add_dependency(self);
            self.subscribers
                .borrow_mut()
                .insert(effect.id(), Subscriber::Effect(effect));
        }
    }

    pub(crate) fn insert(&self, subscriber: Subscriber) {
        self.subscribers
            .borrow_mut()
            .insert(subscriber.id(), subscriber);
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Copy of the current subscriber set, in subscription order.
    pub(crate) fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.borrow().values().cloned().collect()
    }

    /// Notify every subscriber present at the time of the call.
    pub(crate) fn trigger(&self) {
        Runtime::notify(self.snapshot());
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn trigger_uses_snapshot_of_subscribers() {
        let dep = Dep::new();
        let calls = Rc::new(Cell::new(0));

        // The first listener removes the second mid-notification; the
        // snapshot still delivers to both.
        let second = Subscriber::listener({
            let calls = calls.clone();
            move || calls.set(calls.get() + 1)
        });
        let second_id = second.id();
        let first = Subscriber::listener({
            let calls = calls.clone();
            let dep = Rc::downgrade(&dep);
            move || {
                calls.set(calls.get() + 1);
                if let Some(dep) = dep.upgrade() {
                    dep.remove(second_id);
                }
            }
        });

        dep.insert(first);
        dep.insert(second);
        dep.trigger();

        assert_eq!(calls.get(), 2);
        assert_eq!(dep.len(), 1);
    }

    #[test]
    fn track_outside_effect_is_noop() {
        let dep = Dep::new();
        dep.track();
        assert_eq!(dep.len(), 0);
    }
}
