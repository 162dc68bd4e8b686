//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects state containers
//! and effects to the outside world's notion of time. It owns three pieces
//! of thread-local state:
//!
//! - The microtask queue. `Runtime::queue_microtask` stands in for the
//!   platform's microtask boundary and `Runtime::tick` drains it. The
//!   embedder calls `tick` once the current synchronous turn is done.
//! - The batch. Inside `batch(..)`, notifications are collected (each
//!   subscriber at most once) and delivered when the outermost batch exits.
//! - The configuration, which selects synchronous or microtask-deferred
//!   state notification.
//!
//! # How Notification Works
//!
//! 1. A state write that changes the value takes a snapshot of its
//!    subscribers and hands it to `Runtime::notify`.
//! 2. In `NotifyMode::Sync` outside a batch, each subscriber is notified on
//!    the spot.
//! 3. Otherwise the subscribers are parked in the pending set, keyed by ID,
//!    so any number of writes before delivery coalesce into one round.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use indexmap::IndexMap;

use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;

type Microtask = Box<dyn FnOnce() -> Result<()>>;

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Microtask>> = RefCell::new(VecDeque::new());
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
    static CONFIG: Cell<RuntimeConfig> = const { Cell::new(RuntimeConfig::new()) };
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: IndexMap<SubscriberId, Subscriber>,
    flush_queued: bool,
}

/// When state notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyMode {
    /// Subscribers run inside the write that changed the value.
    #[default]
    Sync,

    /// Subscribers run at the next microtask boundary.
    Microtask,
}

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeConfig {
    pub notify: NotifyMode,
}

impl RuntimeConfig {
    pub const fn new() -> Self {
        Self {
            notify: NotifyMode::Sync,
        }
    }

    pub const fn with_notify(mut self, notify: NotifyMode) -> Self {
        self.notify = notify;
        self
    }
}

/// The reactive runtime for the current thread.
pub struct Runtime;

impl Runtime {
    /// Replace the runtime configuration.
    pub fn configure(config: RuntimeConfig) {
        tracing::debug!(?config, "runtime configured");
        CONFIG.with(|c| c.set(config));
    }

    pub fn config() -> RuntimeConfig {
        CONFIG.with(|c| c.get())
    }

    /// Queue work for the next microtask boundary.
    pub fn queue_microtask(task: impl FnOnce() -> Result<()> + 'static) {
        MICROTASKS.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
    }

    /// Number of microtasks waiting for the next `tick`.
    pub fn pending_microtasks() -> usize {
        MICROTASKS.with(|queue| queue.borrow().len())
    }

    /// Drain the microtask queue, including tasks queued while draining.
    ///
    /// Every task runs even if an earlier one fails. The first error is
    /// returned; later ones are logged.
    pub fn tick() -> Result<()> {
        let mut first_error = None;

        loop {
            let task = MICROTASKS.with(|queue| queue.borrow_mut().pop_front());
            let Some(task) = task else {
                break;
            };

            if let Err(error) = task() {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    tracing::error!(%error, "additional microtask failure");
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Run `f` with notifications deferred until the outermost batch exits.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        struct BatchGuard;

        impl Drop for BatchGuard {
            fn drop(&mut self) {
                let outermost = BATCH.with(|b| {
                    let mut b = b.borrow_mut();
                    b.depth -= 1;
                    b.depth == 0
                });
                if outermost && Runtime::config().notify == NotifyMode::Sync {
                    Runtime::flush_pending();
                }
            }
        }

        BATCH.with(|b| b.borrow_mut().depth += 1);
        let _guard = BatchGuard;
        f()
    }

    /// Whether a batch is currently open.
    pub fn is_batching() -> bool {
        BATCH.with(|b| b.borrow().depth > 0)
    }

    /// Deliver a change notification to a snapshot of subscribers.
    pub(crate) fn notify(subscribers: Vec<Subscriber>) {
        if subscribers.is_empty() {
            return;
        }

        let mode = Self::config().notify;
        let immediate = BATCH.with(|b| {
            let mut b = b.borrow_mut();
            if b.depth == 0 && mode == NotifyMode::Sync {
                return Some(subscribers);
            }
            for subscriber in subscribers {
                b.pending.entry(subscriber.id()).or_insert(subscriber);
            }
            if mode == NotifyMode::Microtask && !b.flush_queued {
                b.flush_queued = true;
                Self::queue_microtask(|| {
                    Self::flush_pending();
                    Ok(())
                });
            }
            None
        });

        if let Some(subscribers) = immediate {
            for subscriber in subscribers {
                subscriber.notify();
            }
        }
    }

    fn flush_pending() {
        loop {
            let pending = BATCH.with(|b| {
                let mut b = b.borrow_mut();
                b.flush_queued = false;
                std::mem::take(&mut b.pending)
            });
            if pending.is_empty() {
                break;
            }
            tracing::trace!(count = pending.len(), "delivering deferred notifications");
            for subscriber in pending.into_values() {
                subscriber.notify();
            }
        }
    }
}

/// Run `f` as a batch; see [`Runtime::batch`].
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::{effect, state};
    use std::rc::Rc;

    #[test]
    fn tick_runs_microtasks_in_order_including_nested() {
        let log = Rc::new(RefCell::new(Vec::new()));

        Runtime::queue_microtask({
            let log = log.clone();
            move || {
                log.borrow_mut().push(1);
                let log = log.clone();
                Runtime::queue_microtask(move || {
                    log.borrow_mut().push(3);
                    Ok(())
                });
                Ok(())
            }
        });
        Runtime::queue_microtask({
            let log = log.clone();
            move || {
                log.borrow_mut().push(2);
                Ok(())
            }
        });

        assert_eq!(Runtime::pending_microtasks(), 2);
        Runtime::tick().unwrap();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert_eq!(Runtime::pending_microtasks(), 0);
    }

    #[test]
    fn tick_returns_first_error_and_keeps_draining() {
        let ran = Rc::new(Cell::new(false));

        Runtime::queue_microtask(|| Err(Error::MissingComponentName));
        Runtime::queue_microtask({
            let ran = ran.clone();
            move || {
                ran.set(true);
                Ok(())
            }
        });

        assert!(matches!(Runtime::tick(), Err(Error::MissingComponentName)));
        assert!(ran.get());
    }

    #[test]
    fn batch_coalesces_notifications() {
        let a = state(1);
        let b = state(2);
        let runs = Rc::new(Cell::new(0));

        let _effect = effect({
            let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
            move || {
                a.get();
                b.get();
                runs.set(runs.get() + 1);
            }
        });

        batch(|| {
            a.set(10);
            b.set(20);
            a.set(11);
            assert_eq!(runs.get(), 1);
        });
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn microtask_mode_defers_until_tick() {
        Runtime::configure(RuntimeConfig::new().with_notify(NotifyMode::Microtask));

        let a = state(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _effect = effect({
            let (a, seen) = (a.clone(), seen.clone());
            move || seen.borrow_mut().push(a.get())
        });

        a.set(1);
        a.set(2);
        // Writes are visible immediately; delivery waits for the boundary.
        assert_eq!(a.get_untracked(), 2);
        assert_eq!(*seen.borrow(), vec![0]);

        Runtime::tick().unwrap();
        assert_eq!(*seen.borrow(), vec![0, 2]);

        Runtime::configure(RuntimeConfig::default());
    }
}
