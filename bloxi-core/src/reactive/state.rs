//! State Implementation
//!
//! A `State` is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How State Works
//!
//! 1. When a state container is read within a reactive context (an effect
//!    or a computed getter), it registers that context as a subscriber.
//!
//! 2. When its value changes, all subscribers are notified from a snapshot
//!    taken before delivery starts, so subscribers that subscribe or
//!    unsubscribe while running cannot disturb the round.
//!
//! 3. Writing a value equal to the current one is a no-op.
//!
//! # Memory Layout
//!
//! Each container is one shared allocation holding the value and its
//! dependency record. Handles are cheap to clone and all refer to the same
//! value.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::dep::{Dep, DepId};
use super::subscriber::{Subscriber, Subscription};

struct StateInner<T> {
    dep: Rc<Dep>,
    value: RefCell<T>,
}

/// A reactive container holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use bloxi_core::reactive::state;
///
/// let count = state(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// count.update(|v| v + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct State<T: 'static> {
    inner: Rc<StateInner<T>>,
}

impl<T: 'static> State<T> {
    /// Create a new container with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(StateInner {
                dep: Dep::new(),
                value: RefCell::new(value),
            }),
        }
    }

    /// The container's dependency ID.
    pub fn id(&self) -> DepId {
        self.inner.dep.id()
    }

    /// Get the current value, tracking it in the running effect.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.dep.track();
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, tracking it in the running effect.
    ///
    /// The value stays borrowed while `f` runs. Reading the same container
    /// from `f` is fine; use `get` when `f` needs to write to it.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls `set` or `update` on this container.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.dep.track();
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Does nothing if `value` equals the current value.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }

        self.inner.dep.trigger();
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
        T: PartialEq,
    {
        let new_value = f(&self.inner.value.borrow());
        self.set(new_value);
    }

    /// Register an untracked listener called after every change.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let listener = Subscriber::listener(callback);
        let id = listener.id();
        self.inner.dep.insert(listener);
        Subscription::new(&self.inner.dep, id)
    }

    /// Get the number of subscribers (effects and listeners).
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.len()
    }

    /// Whether two handles refer to the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for State<T>
where
    T: Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id())
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a reactive state container.
pub fn state<T: 'static>(initial: T) -> State<T> {
    State::new(initial)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::cell::Cell;

    #[test]
    fn state_get_and_set() {
        let state = State::new(0);
        assert_eq!(state.get(), 0);

        state.set(42);
        assert_eq!(state.get(), 42);
    }

    #[test]
    fn state_update() {
        let state = State::new(10);
        state.update(|v| v + 5);
        assert_eq!(state.get(), 15);
    }

    #[test]
    fn state_notifies_subscribers() {
        let state = State::new(0);
        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();

        let _sub = state.subscribe(move || {
            call_count_clone.set(call_count_clone.get() + 1);
        });

        assert_eq!(call_count.get(), 0);

        state.set(1);
        assert_eq!(call_count.get(), 1);

        state.set(2);
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn equal_write_does_not_notify() {
        let state = State::new(String::from("a"));
        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();

        let _sub = state.subscribe(move || {
            call_count_clone.set(call_count_clone.get() + 1);
        });

        state.set(String::from("a"));
        state.update(|v| v.clone());
        assert_eq!(call_count.get(), 0);
    }

    #[test]
    fn state_unsubscribe() {
        let state = State::new(0);
        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();

        let sub = state.subscribe(move || {
            call_count_clone.set(call_count_clone.get() + 1);
        });

        state.set(1);
        assert_eq!(call_count.get(), 1);

        sub.unsubscribe();
        state.set(2);
        // Should not have been called again
        assert_eq!(call_count.get(), 1);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn reads_outside_effects_are_not_tracked() {
        let state = State::new(1);
        state.get();
        state.with(|v| *v);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let state = State::new(1);
        let _effect = effect({
            let state = state.clone();
            move || {
                state.get();
                state.get();
                state.with(|_| ());
            }
        });
        assert_eq!(state.subscriber_count(), 1);
    }

    #[test]
    fn write_from_listener_does_not_deadlock() {
        let source = State::new(0);
        let mirror = State::new(0);

        let _sub = source.subscribe({
            let (source, mirror) = (source.clone(), mirror.clone());
            move || {
                let v = source.get_untracked();
                mirror.set(v * 2);
                // Re-entrant write to the notifying container.
                source.set(v);
            }
        });

        source.set(3);
        assert_eq!(mirror.get(), 6);
    }

    #[test]
    fn state_clone_shares_value() {
        let state1 = State::new(0);
        let state2 = state1.clone();

        state1.set(42);
        assert_eq!(state2.get(), 42);
        assert!(state1.ptr_eq(&state2));
        assert_eq!(state1.id(), state2.id());
    }

    #[test]
    fn with_allows_nested_reads() {
        let state = State::new(vec![1, 2, 3]);
        let total = state.with(|items| items.len() + state.get().len());
        assert_eq!(total, 6);
    }

    #[test]
    #[should_panic]
    fn with_rejects_writes_to_the_borrowed_value() {
        let state = State::new(1);
        state.with(|value| state.set(value + 1));
    }
}
