//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a state container notifies when its value
//! changes: either a tracked effect (render effects, computed values, user
//! effects) or an untracked listener registered through `subscribe`.

use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::dep::Dep;
use super::effect::EffectInner;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Dependency records key
/// their subscriber sets by this ID, which is what makes repeated reads
/// within one run idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber to a dependency record.
#[derive(Clone)]
pub(crate) enum Subscriber {
    /// A tracked effect; its subscription is rebuilt on every run.
    Effect(Rc<EffectInner>),

    /// An external listener; stays subscribed until explicitly removed.
    Listener {
        id: SubscriberId,
        callback: Rc<dyn Fn()>,
    },
}

impl Subscriber {
    pub(crate) fn listener(callback: impl Fn() + 'static) -> Self {
        Subscriber::Listener {
            id: SubscriberId::new(),
            callback: Rc::new(callback),
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        match self {
            Subscriber::Effect(effect) => effect.id(),
            Subscriber::Listener { id, .. } => *id,
        }
    }

    /// Deliver one change notification.
    pub(crate) fn notify(&self) {
        match self {
            Subscriber::Effect(effect) => EffectInner::trigger(effect),
            Subscriber::Listener { callback, .. } => callback(),
        }
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "dropping a Subscription keeps the listener alive; call unsubscribe() to remove it"]
pub struct Subscription {
    dep: Weak<Dep>,
    id: SubscriberId,
}

impl Subscription {
    pub(crate) fn new(dep: &Rc<Dep>, id: SubscriberId) -> Self {
        Self {
            dep: Rc::downgrade(dep),
            id,
        }
    }

    /// The listener's subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the listener. A no-op if the container is already gone.
    pub fn unsubscribe(self) {
        if let Some(dep) = self.dep.upgrade() {
            dep.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
