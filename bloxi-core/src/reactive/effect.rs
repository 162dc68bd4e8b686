//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazily).
//!
//! 2. When any dependency changes, the effect is triggered. Without a
//!    scheduler it re-runs on the spot; with one, the scheduler decides when
//!    (component render effects queue their instance, computed values mark
//!    themselves dirty).
//!
//! 3. Before re-running, the effect tears down every subscription from its
//!    previous run and rebuilds the set from the reads it performs now, so
//!    conditional reads prune stale dependencies.
//!
//! # Cleanup
//!
//! `on_cleanup` registers callbacks on the running effect. They run once,
//! when the effect is disposed.
//!
//! # Ownership
//!
//! Subscribed effects are kept alive by the state containers they read.
//! Dropping an `Effect` handle does not stop it; `dispose` does. Effects
//! created while a component's setup is running are owned by that component
//! and disposed when it unmounts.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::subscriber::SubscriberId;
use crate::component::InstanceId;

pub(crate) struct EffectInner {
    id: SubscriberId,
    body: Rc<dyn Fn()>,
    scheduler: Option<Rc<dyn Fn()>>,
    owner: Option<InstanceId>,
    dependencies: RefCell<IndexMap<DepId, Weak<Dep>>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    running: Cell<bool>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

/// Resets the running flag on every exit path.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl EffectInner {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn add_dependency(&self, dep: &Rc<Dep>) {
        self.dependencies
            .borrow_mut()
            .insert(dep.id(), Rc::downgrade(dep));
    }

    fn clear_dependencies(&self) {
        let deps = std::mem::take(&mut *self.dependencies.borrow_mut());
        for dep in deps.values().filter_map(Weak::upgrade) {
            dep.remove(self.id);
        }
    }

    /// React to a dependency change.
    pub(crate) fn trigger(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        if self.running.get() {
            tracing::trace!(effect = self.id.raw(), "skipping re-entrant trigger");
            return;
        }
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => self.run(),
        }
    }

    pub(crate) fn run(self: &Rc<Self>) {
        if self.disposed.get() || self.running.get() {
            return;
        }

        self.clear_dependencies();

        self.running.set(true);
        let _running = RunningGuard(&self.running);
        let _ctx = ReactiveContext::enter(Rc::clone(self));

        tracing::trace!(effect = self.id.raw(), "running effect");
        let body = Rc::clone(&self.body);
        body();

        self.run_count.set(self.run_count.get() + 1);
    }

    pub(crate) fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        self.cleanups.borrow_mut().push(cleanup);
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.clear_dependencies();
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }
}

/// Options accepted by [`Effect::with_options`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,

    /// Called instead of re-running when a dependency changes.
    pub scheduler: Option<Rc<dyn Fn()>>,

    /// The component instance this effect renders for, if any.
    pub owner: Option<InstanceId>,
}

impl EffectOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn() + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn owner(mut self, owner: InstanceId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use bloxi_core::reactive::{effect, state};
///
/// let count = state(0);
///
/// let watcher = {
///     let count = count.clone();
///     effect(move || println!("count is {}", count.get()))
/// };
///
/// count.set(5); // prints "count is 5"
/// watcher.dispose();
/// ```
#[derive(Clone)]
pub struct Effect(Rc<EffectInner>);

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create a new effect without running it immediately.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, EffectOptions::default().lazy())
    }

    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self(Rc::new(EffectInner {
            id: SubscriberId::new(),
            body: Rc::new(run),
            scheduler: options.scheduler,
            owner: options.owner,
            dependencies: RefCell::new(IndexMap::new()),
            cleanups: RefCell::new(Vec::new()),
            running: Cell::new(false),
            disposed: Cell::new(false),
            run_count: Cell::new(0),
        }));

        // Effects created during component setup die with the component.
        crate::component::adopt_effect(&effect);

        if !options.lazy {
            effect.run();
        }

        effect
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    /// The owning component instance, if any.
    pub fn owner(&self) -> Option<InstanceId> {
        self.0.owner
    }

    /// Execute the effect function, rebuilding its dependency set.
    pub fn run(&self) {
        self.0.run();
    }

    /// Behave as if a dependency changed: run, or hand off to the scheduler.
    pub fn schedule(&self) {
        self.0.trigger();
    }

    /// Dispose of the effect.
    ///
    /// Removes it from every subscriber set and runs registered cleanups.
    /// After disposal, the effect will not run again. Idempotent.
    pub fn dispose(&self) {
        self.0.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }

    pub fn is_running(&self) -> bool {
        self.0.running.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Number of live sources read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.0
            .dependencies
            .borrow()
            .values()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }

    pub(crate) fn inner(&self) -> &Rc<EffectInner> {
        &self.0
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.0.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect that runs now and again whenever its reads change.
pub fn effect<F>(run: F) -> Effect
where
    F: Fn() + 'static,
{
    Effect::new(run)
}

/// Register a cleanup on the running effect. It runs when the effect is
/// disposed.
pub fn on_cleanup(cleanup: impl FnOnce() + 'static) {
    match ReactiveContext::current_effect() {
        Some(effect) => effect.add_cleanup(Box::new(cleanup)),
        None => tracing::warn!("on_cleanup called outside of a running effect"),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::state;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new_lazy(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 0);
        assert_eq!(effect.run_count(), 0);

        effect.run();
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let count = state(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _effect = Effect::new({
            let count = count.clone();
            let seen = seen.clone();
            move || seen.borrow_mut().push(count.get())
        });

        count.set(1);
        count.set(2);
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let count = state(0);
        let run_count = Rc::new(Cell::new(0));

        let effect = Effect::new({
            let count = count.clone();
            let run_count = run_count.clone();
            move || {
                count.get();
                run_count.set(run_count.get() + 1);
            }
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(count.subscriber_count(), 0);

        count.set(1);
        effect.run();
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn conditional_reads_prune_dependencies() {
        let flag = state(true);
        let a = state(1);
        let b = state(2);
        let runs = Rc::new(Cell::new(0));

        let effect = Effect::new({
            let (flag, a, b, runs) = (flag.clone(), a.clone(), b.clone(), runs.clone());
            move || {
                runs.set(runs.get() + 1);
                if flag.get() {
                    a.get();
                } else {
                    b.get();
                }
            }
        });
        assert_eq!(effect.dependency_count(), 2);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        flag.set(false);
        assert_eq!(effect.dependency_count(), 2);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        // `a` is no longer a dependency.
        a.set(10);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let count = state(0);
        let scheduled = Rc::new(Cell::new(0));

        let effect = Effect::with_options(
            {
                let count = count.clone();
                move || {
                    count.get();
                }
            },
            EffectOptions::default().scheduler({
                let scheduled = scheduled.clone();
                move || scheduled.set(scheduled.get() + 1)
            }),
        );

        count.set(1);
        assert_eq!(scheduled.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let count = state(0);
        let effect = Effect::new({
            let count = count.clone();
            move || {
                let v = count.get();
                if v < 5 {
                    count.set(v + 1);
                }
            }
        });

        assert_eq!(effect.run_count(), 1);
        assert_eq!(count.get_untracked(), 1);
    }

    #[test]
    fn cleanup_runs_once_on_dispose() {
        let cleaned = Rc::new(Cell::new(0));
        let effect = Effect::new({
            let cleaned = cleaned.clone();
            move || {
                let cleaned = cleaned.clone();
                on_cleanup(move || cleaned.set(cleaned.get() + 1));
            }
        });

        assert_eq!(cleaned.get(), 0);
        effect.dispose();
        effect.dispose();
        assert_eq!(cleaned.get(), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
