//! Update Scheduler
//!
//! The scheduler batches component re-renders so that any number of state
//! writes in one synchronous turn cost each affected component one render.
//!
//! # Algorithm
//!
//! 1. When a render effect's dependency changes, its instance is added to
//!    the pending set. The set is keyed by instance ID and keeps insertion
//!    order, so queueing the same instance twice is a no-op.
//! 2. The first queue after a flush schedules one flush microtask.
//! 3. The flush moves the pending set into its working set and clears it.
//!    An instance queued while it is still waiting in the working set keeps
//!    its place and renders once, with whatever props it has by then. An
//!    instance queued after it has already rendered lands in the next flush.
//! 4. Each instance that is still mounted re-runs its render effect, which
//!    rebuilds its dependencies, and commits the new tree against the
//!    previous one through the renderer. Instances unmounted in the meantime
//!    are skipped.
//!
//! Instances flush in mount order. A component mounts after the component
//! that rendered it, so parents render before their children and the props
//! a parent hands down are in place when the child's turn comes.

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::component::{ComponentInstance, InstanceId};
use crate::error::Result;
use crate::reactive::Runtime;

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

#[derive(Default)]
struct SchedulerState {
    pending: IndexMap<InstanceId, ComponentInstance>,
    /// Instances of the running flush that have not rendered yet.
    flushing: IndexMap<InstanceId, ComponentInstance>,
    flush_scheduled: bool,
    flushes: usize,
}

/// The component update queue for the current thread.
pub struct UpdateScheduler;

impl UpdateScheduler {
    /// Queue an instance for re-render at the next flush.
    pub fn queue(instance: &ComponentInstance) {
        instance.mark_update_pending();

        let schedule = SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            if s.flushing.contains_key(&instance.id()) {
                return None;
            }
            s.pending
                .entry(instance.id())
                .or_insert_with(|| instance.clone());
            Some(!std::mem::replace(&mut s.flush_scheduled, true))
        });

        let Some(schedule) = schedule else {
            tracing::trace!(
                component = instance.name(),
                instance = instance.id().raw(),
                "update already part of the running flush"
            );
            return;
        };

        tracing::trace!(
            component = instance.name(),
            instance = instance.id().raw(),
            "update queued"
        );

        if schedule {
            Runtime::queue_microtask(Self::flush);
        }
    }

    /// Re-render every pending instance.
    ///
    /// All instances are processed even if one fails. The first error is
    /// returned; later ones are logged.
    pub fn flush() -> Result<()> {
        let count = SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            s.flush_scheduled = false;
            s.flushes += 1;
            let pending = std::mem::take(&mut s.pending);
            s.flushing.extend(pending);
            s.flushing.sort_keys();
            s.flushing.len()
        });

        tracing::debug!(count, "flushing component updates");

        let mut first_error = None;
        loop {
            let next = SCHEDULER.with(|s| s.borrow_mut().flushing.shift_remove_index(0));
            let Some((_, instance)) = next else {
                break;
            };
            if !instance.is_mounted() {
                tracing::trace!(
                    component = instance.name(),
                    "skipping update for unmounted instance"
                );
                continue;
            }
            if let Err(error) = instance.flush_update() {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    tracing::error!(%error, "additional update failure");
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Number of instances waiting for the next flush.
    pub fn pending_count() -> usize {
        SCHEDULER.with(|s| s.borrow().pending.len())
    }

    /// Whether a flush microtask is queued.
    pub fn is_flush_scheduled() -> bool {
        SCHEDULER.with(|s| s.borrow().flush_scheduled)
    }

    /// Number of flushes run on this thread.
    pub fn flush_count() -> usize {
        SCHEDULER.with(|s| s.borrow().flushes)
    }
}
