//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a state container is
//! read, we can register the current effect as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing effect.
//! When entering a reactive context (running an effect or a computed
//! getter), we push a frame onto the stack. When the computation completes,
//! the guard pops it, including when the computation panics.
//!
//! A frame may also be *untracked*: reads inside it register nothing, even
//! when an effect further down the stack is running. Component setup runs
//! in such a frame so that a parent's render never subscribes to a child's
//! setup reads.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::EffectInner;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The running effect, or `None` for an untracked frame.
    effect: Option<Rc<EffectInner>>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking frame for the given effect.
    pub(crate) fn enter(effect: Rc<EffectInner>) -> Self {
        let subscriber_id = Some(effect.id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                effect: Some(effect),
            });
        });
        Self { subscriber_id }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { effect: None });
        });
        Self {
            subscriber_id: None,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.effect.is_some())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.effect.as_ref().map(|e| e.id()))
        })
    }

    /// Number of frames on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn current_effect() -> Option<Rc<EffectInner>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.effect.clone())
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Catch mismatched guards in debug builds.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.effect.as_ref().map(|e| e.id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, EffectOptions};

    fn lazy_effect() -> Effect {
        Effect::with_options(|| {}, EffectOptions::default().lazy())
    }

    #[test]
    fn context_tracks_subscriber() {
        let effect = lazy_effect();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(effect.inner().clone());

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(effect.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let outer = lazy_effect();
        let inner = lazy_effect();

        {
            let _ctx1 = ReactiveContext::enter(outer.inner().clone());
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(inner.inner().clone());
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_frame_hides_outer_effect() {
        let outer = lazy_effect();
        let _ctx = ReactiveContext::enter(outer.inner().clone());

        untrack(|| {
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::current_subscriber().is_none());
        });

        assert!(ReactiveContext::is_active());
    }

    #[test]
    fn guard_restores_stack_on_panic() {
        let effect = lazy_effect();
        let inner = effect.inner().clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _ctx = ReactiveContext::enter(inner);
            panic!("render failed");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
