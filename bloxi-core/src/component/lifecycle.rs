//! Lifecycle hooks.
//!
//! Every instance carries a `LifecycleHooks` bundle seeded from its
//! definition's option-level hooks. Hooks registered from `setup` through
//! `on_mount`, `on_update` and `on_unmount` are appended to the bundle of
//! the instance being set up, found through a thread-local stack of
//! instances.
//!
//! # How Setup Scopes Work
//!
//! 1. Mounting pushes the instance onto the stack with a `SetupScope` guard.
//! 2. `setup` runs; hook registrations and new effects attach to the top of
//!    the stack.
//! 3. The guard pops the instance, including when setup fails or panics, so
//!    a nested mount can never leave a stale instance behind.
//!
//! Outside a setup scope the registration hooks log a warning and do
//! nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::instance::ComponentInstance;
use crate::reactive::Effect;

thread_local! {
    static CURRENT_INSTANCE: RefCell<Vec<ComponentInstance>> = const { RefCell::new(Vec::new()) };
}

type Hook = Rc<dyn Fn()>;

/// The points in an instance's life where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Right before the first render, inside the render pass.
    BeforeMount,
    /// After the first render, at the next microtask boundary.
    Mounted,
    /// Right before each later render.
    BeforeUpdate,
    /// After each later render, at the next microtask boundary.
    Updated,
    BeforeUnmount,
    Unmounted,
}

/// Ordered hook lists, one per phase.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    before_mount: Vec<Hook>,
    mounted: Vec<Hook>,
    before_update: Vec<Hook>,
    updated: Vec<Hook>,
    before_unmount: Vec<Hook>,
    unmounted: Vec<Hook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, phase: LifecyclePhase) -> &Vec<Hook> {
        match phase {
            LifecyclePhase::BeforeMount => &self.before_mount,
            LifecyclePhase::Mounted => &self.mounted,
            LifecyclePhase::BeforeUpdate => &self.before_update,
            LifecyclePhase::Updated => &self.updated,
            LifecyclePhase::BeforeUnmount => &self.before_unmount,
            LifecyclePhase::Unmounted => &self.unmounted,
        }
    }

    fn list_mut(&mut self, phase: LifecyclePhase) -> &mut Vec<Hook> {
        match phase {
            LifecyclePhase::BeforeMount => &mut self.before_mount,
            LifecyclePhase::Mounted => &mut self.mounted,
            LifecyclePhase::BeforeUpdate => &mut self.before_update,
            LifecyclePhase::Updated => &mut self.updated,
            LifecyclePhase::BeforeUnmount => &mut self.before_unmount,
            LifecyclePhase::Unmounted => &mut self.unmounted,
        }
    }

    /// Append a hook; hooks of one phase run in registration order.
    pub fn push(&mut self, phase: LifecyclePhase, hook: impl Fn() + 'static) {
        self.push_rc(phase, Rc::new(hook));
    }

    pub(crate) fn push_rc(&mut self, phase: LifecyclePhase, hook: Hook) {
        self.list_mut(phase).push(hook);
    }

    /// Number of hooks registered for a phase.
    pub fn count(&self, phase: LifecyclePhase) -> usize {
        self.list(phase).len()
    }

    pub(crate) fn call(&self, phase: LifecyclePhase) {
        for hook in self.list(phase) {
            hook();
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("before_mount", &self.before_mount.len())
            .field("mounted", &self.mounted.len())
            .field("before_update", &self.before_update.len())
            .field("updated", &self.updated.len())
            .field("before_unmount", &self.before_unmount.len())
            .field("unmounted", &self.unmounted.len())
            .finish()
    }
}

/// Guard marking an instance as the one being set up.
pub(crate) struct SetupScope;

impl SetupScope {
    pub(crate) fn enter(instance: &ComponentInstance) -> Self {
        CURRENT_INSTANCE.with(|stack| stack.borrow_mut().push(instance.clone()));
        SetupScope
    }
}

impl Drop for SetupScope {
    fn drop(&mut self) {
        CURRENT_INSTANCE.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The instance whose setup is currently running, if any.
pub fn current_instance() -> Option<ComponentInstance> {
    CURRENT_INSTANCE.with(|stack| stack.borrow().last().cloned())
}

fn register(hook_name: &str, phase: LifecyclePhase, hook: Hook) {
    match current_instance() {
        Some(instance) => instance.push_hook(phase, hook),
        None => tracing::warn!(hook = hook_name, "lifecycle hook called outside of component setup"),
    }
}

/// Run `f` after the component's first render has been committed.
pub fn on_mount(f: impl Fn() + 'static) {
    register("on_mount", LifecyclePhase::Mounted, Rc::new(f));
}

/// Run `f` after every re-render of the component.
pub fn on_update(f: impl Fn() + 'static) {
    register("on_update", LifecyclePhase::Updated, Rc::new(f));
}

/// Run `f` once the component has been unmounted.
pub fn on_unmount(f: impl Fn() + 'static) {
    register("on_unmount", LifecyclePhase::Unmounted, Rc::new(f));
}

/// Hand an effect created during setup to the instance being set up.
pub(crate) fn adopt_effect(effect: &Effect) {
    if let Some(instance) = current_instance() {
        instance.adopt_effect(effect.clone());
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn hooks_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = LifecycleHooks::new();

        for n in 0..3 {
            let log = log.clone();
            hooks.push(LifecyclePhase::Mounted, move || log.borrow_mut().push(n));
        }

        hooks.call(LifecyclePhase::Mounted);
        hooks.call(LifecyclePhase::Updated);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(hooks.count(LifecyclePhase::Mounted), 3);
        assert_eq!(hooks.count(LifecyclePhase::Updated), 0);
    }

    #[test]
    fn registration_outside_setup_is_a_noop() {
        let called = Rc::new(Cell::new(false));
        let called_clone = called.clone();

        assert!(current_instance().is_none());
        on_mount(move || called_clone.set(true));
        on_update(|| {});
        on_unmount(|| {});

        assert!(current_instance().is_none());
        assert!(!called.get());
    }
}
