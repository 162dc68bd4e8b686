//! Computed Implementation
//!
//! A `Computed` is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. On first access, the getter runs inside the computed's own effect and
//!    the result is cached.
//!
//! 2. When accessed again and nothing changed, the cached value is returned.
//!
//! 3. When a dependency changes, the effect's scheduler marks the value
//!    dirty and notifies the computed's own readers. It does not recompute.
//!
//! 4. The next read pays for the recomputation, so any number of dependency
//!    writes between two reads cost one evaluation.
//!
//! Reading a computed value inside another effect subscribes that effect
//! to the computed, which is how tracking propagates transitively.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::dep::Dep;
use super::effect::{Effect, EffectOptions};
use super::subscriber::{Subscriber, Subscription};

struct ComputedInner<T> {
    dep: Rc<Dep>,
    getter: Rc<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    recompute_count: Cell<usize>,
    effect: Effect,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.dispose();
    }
}

/// A read-only, lazily recomputed derived value.
///
/// # Example
///
/// ```rust
/// use bloxi_core::reactive::{computed, state};
///
/// let a = state(1);
/// let b = state(2);
/// let sum = {
///     let (a, b) = (a.clone(), b.clone());
///     computed(move || a.get() + b.get())
/// };
///
/// assert_eq!(sum.get(), 3);
/// a.set(10);
/// b.set(20);
/// assert_eq!(sum.get(), 30);
/// assert_eq!(sum.recompute_count(), 2);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a new computed value. The getter does not run until first read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let body = {
                let weak = weak.clone();
                move || {
                    if let Some(inner) = weak.upgrade() {
                        let value = (inner.getter)();
                        *inner.value.borrow_mut() = Some(value);
                        inner.dirty.set(false);
                        inner.recompute_count.set(inner.recompute_count.get() + 1);
                    }
                }
            };
            let mark_dirty = {
                let weak = weak.clone();
                move || {
                    if let Some(inner) = weak.upgrade() {
                        if !inner.dirty.replace(true) {
                            inner.dep.trigger();
                        }
                    }
                }
            };

            ComputedInner {
                dep: Dep::new(),
                getter: Rc::new(getter),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                recompute_count: Cell::new(0),
                effect: Effect::with_options(
                    body,
                    EffectOptions::default().lazy().scheduler(mark_dirty),
                ),
            }
        });

        Self { inner }
    }

    /// Get the current value, recomputing first if it is dirty.
    pub fn get(&self) -> T {
        self.inner.dep.track();

        if self.inner.dirty.get() {
            self.inner.effect.run();
        }

        let cached = self.inner.value.borrow().clone();
        // Only empty when the getter reads this computed recursively.
        cached.unwrap_or_else(|| (self.inner.getter)())
    }

    /// Register an untracked listener called whenever the value goes dirty.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let listener = Subscriber::listener(callback);
        let id = listener.id();
        self.inner.dep.insert(listener);
        Subscription::new(&self.inner.dep, id)
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Number of times the getter has been evaluated.
    pub fn recompute_count(&self) -> usize {
        self.inner.recompute_count.get()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Number of readers subscribed to this computed value.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.len()
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.is_dirty())
            .field("value", &*self.inner.value.borrow())
            .field("recompute_count", &self.recompute_count())
            .finish()
    }
}

/// Create a computed value from a getter.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, state};

    #[test]
    fn computed_computes_on_first_access() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();

        let computed = Computed::new(move || {
            calls_clone.set(calls_clone.get() + 1);
            42
        });

        // Not computed yet
        assert!(!computed.has_value());
        assert!(computed.is_dirty());
        assert_eq!(calls.get(), 0);

        assert_eq!(computed.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let source = state(2);
        let doubled = {
            let source = source.clone();
            computed(move || source.get() * 2)
        };

        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.recompute_count(), 1);
    }

    #[test]
    fn dependency_change_marks_dirty_without_recomputing() {
        let source = state(1);
        let doubled = {
            let source = source.clone();
            computed(move || source.get() * 2)
        };

        assert_eq!(doubled.get(), 2);
        source.set(5);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.recompute_count(), 1);

        assert_eq!(doubled.get(), 10);
        assert_eq!(doubled.recompute_count(), 2);
    }

    #[test]
    fn two_writes_before_read_recompute_once() {
        let a = state(1);
        let b = state(2);
        let sum = {
            let (a, b) = (a.clone(), b.clone());
            computed(move || a.get() + b.get())
        };

        assert_eq!(sum.get(), 3);
        a.set(10);
        b.set(20);
        assert_eq!(sum.get(), 30);
        assert_eq!(sum.recompute_count(), 2);
    }

    #[test]
    fn effect_reading_computed_reruns_on_source_change() {
        let source = state(1);
        let doubled = {
            let source = source.clone();
            computed(move || source.get() * 2)
        };
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _effect = effect({
            let (doubled, seen) = (doubled.clone(), seen.clone());
            move || seen.borrow_mut().push(doubled.get())
        });

        source.set(3);
        source.set(4);
        assert_eq!(*seen.borrow(), vec![2, 6, 8]);
    }

    #[test]
    fn computed_depends_on_computed() {
        let base = state(5);
        let doubled = {
            let base = base.clone();
            computed(move || base.get() * 2)
        };
        let plus_ten = {
            let doubled = doubled.clone();
            computed(move || doubled.get() + 10)
        };

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert!(doubled.is_dirty());
        assert!(plus_ten.is_dirty());
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn dropping_computed_releases_sources() {
        let source = state(1);
        let doubled = {
            let source = source.clone();
            computed(move || source.get() * 2)
        };
        doubled.get();
        assert_eq!(source.subscriber_count(), 1);

        drop(doubled);
        assert_eq!(source.subscriber_count(), 0);
    }
}
