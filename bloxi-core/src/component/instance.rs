//! Component Instances
//!
//! An instance is created when a renderer materializes a component node and
//! lives until that node is unmounted.
//!
//! # How Instances Work
//!
//! 1. `mount` runs the definition's `setup` inside a setup scope with
//!    tracking suspended, so hooks registered by setup attach here and the
//!    enclosing render never subscribes to setup's reads.
//!
//! 2. A render effect is created for the instance. Its first run calls the
//!    `before_mount` hooks, renders, stores the tree, and queues `mounted`
//!    for the next microtask. Later runs do the same with `before_update`
//!    and `updated`.
//!
//! 3. When something the render read changes, the effect does not re-render
//!    on the spot. Its scheduler queues the instance on the
//!    `UpdateScheduler`, and the flush re-runs the render effect and hands
//!    the previous and new trees to the renderer's commit hook.
//!
//! 4. `unmount` runs `before_unmount`, disposes the render effect and every
//!    effect created during setup, then runs `unmounted`.
//!
//! A failed render leaves the last good tree in place. The error is logged
//! with the component's name and returned from `mount` or the flush.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::definition::{ComponentDef, ComponentProps};
use super::lifecycle::{LifecycleHooks, LifecyclePhase, SetupScope};
use crate::error::{Error, Result};
use crate::reactive::{untrack, Effect, EffectOptions, Runtime};
use crate::render::UpdateScheduler;
use crate::vdom::{ComponentBinding, VNode};

/// Unique identifier for a mounted instance. Allocated in mount order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Where an instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Setup has run; the first render has not completed.
    Created,
    Mounted,
    /// Terminal.
    Unmounted,
}

/// Called by a flush with the previous and the new rendered tree.
pub(crate) type CommitHook = Rc<dyn Fn(&VNode, &VNode) -> Result<()>>;

struct InstanceInner {
    id: InstanceId,
    def: Rc<ComponentDef>,
    props: RefCell<Rc<dyn ComponentProps>>,
    setup_state: RefCell<Option<Rc<dyn Any>>>,
    vnode: RefCell<Option<VNode>>,
    hooks: RefCell<LifecycleHooks>,
    render_effect: RefCell<Option<Effect>>,
    owned_effects: RefCell<Vec<Effect>>,
    state: Cell<InstanceState>,
    update_pending: Cell<bool>,
    render_error: RefCell<Option<Error>>,
    commit: RefCell<Option<CommitHook>>,
}

/// A mounted component.
#[derive(Clone)]
pub struct ComponentInstance(Rc<InstanceInner>);

impl ComponentInstance {
    /// Run setup and the first render for a component node's binding.
    pub fn mount(binding: &ComponentBinding) -> Result<Self> {
        let def = Rc::clone(binding.definition());
        let instance = Self(Rc::new(InstanceInner {
            id: InstanceId::next(),
            hooks: RefCell::new(def.hooks().clone()),
            def,
            props: RefCell::new(Rc::clone(binding.props())),
            setup_state: RefCell::new(None),
            vnode: RefCell::new(None),
            render_effect: RefCell::new(None),
            owned_effects: RefCell::new(Vec::new()),
            state: Cell::new(InstanceState::Created),
            update_pending: Cell::new(false),
            render_error: RefCell::new(None),
            commit: RefCell::new(None),
        }));

        tracing::debug!(
            component = instance.name(),
            instance = instance.id().raw(),
            "mounting component"
        );

        let setup_state = {
            let _scope = SetupScope::enter(&instance);
            let props = instance.props();
            untrack(|| instance.0.def.run_setup(&*props))
        };
        let setup_state = match setup_state {
            Ok(state) => state,
            Err(error) => {
                instance.teardown();
                return Err(error);
            }
        };
        *instance.0.setup_state.borrow_mut() = Some(setup_state);

        let body = {
            let weak = Rc::downgrade(&instance.0);
            move || {
                if let Some(inner) = weak.upgrade() {
                    ComponentInstance(inner).render_pass();
                }
            }
        };
        let scheduler = {
            let weak = Rc::downgrade(&instance.0);
            move || {
                if let Some(inner) = weak.upgrade() {
                    UpdateScheduler::queue(&ComponentInstance(inner));
                }
            }
        };
        let effect = Effect::with_options(
            body,
            EffectOptions::default()
                .lazy()
                .scheduler(scheduler)
                .owner(instance.id()),
        );
        *instance.0.render_effect.borrow_mut() = Some(effect.clone());

        effect.run();
        if let Some(error) = instance.take_render_error() {
            instance.teardown();
            return Err(error);
        }

        Ok(instance)
    }

    /// The render effect's body.
    fn render_pass(&self) {
        let inner = &self.0;
        let first = inner.state.get() == InstanceState::Created;
        let hooks = inner.hooks.borrow().clone();

        // Hook reads are not render dependencies.
        untrack(|| {
            hooks.call(if first {
                LifecyclePhase::BeforeMount
            } else {
                LifecyclePhase::BeforeUpdate
            })
        });

        let Some(setup_state) = inner.setup_state.borrow().clone() else {
            return;
        };
        let props = self.props();

        match inner.def.run_render(&*setup_state, &*props) {
            Ok(vnode) => {
                *inner.vnode.borrow_mut() = Some(vnode);
                inner.update_pending.set(false);

                let phase = if first {
                    inner.state.set(InstanceState::Mounted);
                    LifecyclePhase::Mounted
                } else {
                    LifecyclePhase::Updated
                };
                Runtime::queue_microtask(move || {
                    hooks.call(phase);
                    Ok(())
                });
            }
            Err(error) => {
                tracing::error!(
                    component = inner.def.name(),
                    instance = inner.id.raw(),
                    %error,
                    "render failed"
                );
                *inner.render_error.borrow_mut() = Some(error);
            }
        }
    }

    fn take_render_error(&self) -> Option<Error> {
        self.0.render_error.borrow_mut().take()
    }

    /// Re-render after a scheduled update and commit the new tree.
    ///
    /// Skipped for instances that are no longer mounted.
    pub(crate) fn flush_update(&self) -> Result<()> {
        self.0.update_pending.set(false);
        if !self.is_mounted() {
            return Ok(());
        }
        let Some(effect) = self.render_effect() else {
            return Ok(());
        };

        let previous = self.vnode();
        effect.run();
        if let Some(error) = self.take_render_error() {
            return Err(error);
        }

        let commit = self.0.commit.borrow().clone();
        match (previous, self.vnode(), commit) {
            (Some(previous), Some(next), Some(commit)) => {
                tracing::trace!(component = self.name(), "committing re-render");
                commit(&previous, &next)
            }
            _ => Ok(()),
        }
    }

    /// Replace the instance's props.
    ///
    /// Structurally equal props are ignored. Otherwise a re-render is queued
    /// on the update scheduler, the same path state changes take.
    pub fn update_props(&self, props: Rc<dyn ComponentProps>) {
        if !self.is_mounted() {
            return;
        }
        let unchanged = (*self.props()).props_eq(&*props);
        if unchanged {
            tracing::trace!(component = self.name(), "props unchanged; skipping update");
            return;
        }
        *self.0.props.borrow_mut() = props;
        UpdateScheduler::queue(self);
    }

    /// Tear the instance down. Idempotent.
    pub fn unmount(&self) {
        if self.state() == InstanceState::Unmounted {
            return;
        }
        tracing::debug!(
            component = self.name(),
            instance = self.id().raw(),
            "unmounting component"
        );

        let hooks = self.0.hooks.borrow().clone();
        hooks.call(LifecyclePhase::BeforeUnmount);
        self.teardown();
        hooks.call(LifecyclePhase::Unmounted);
    }

    /// Dispose every effect and mark the instance unmounted.
    fn teardown(&self) {
        self.0.state.set(InstanceState::Unmounted);
        self.0.update_pending.set(false);
        if let Some(effect) = self.0.render_effect.borrow_mut().take() {
            effect.dispose();
        }
        let owned = std::mem::take(&mut *self.0.owned_effects.borrow_mut());
        for effect in owned {
            effect.dispose();
        }
        *self.0.commit.borrow_mut() = None;
    }

    pub(crate) fn push_hook(&self, phase: LifecyclePhase, hook: Rc<dyn Fn()>) {
        self.0.hooks.borrow_mut().push_rc(phase, hook);
    }

    pub(crate) fn adopt_effect(&self, effect: Effect) {
        self.0.owned_effects.borrow_mut().push(effect);
    }

    pub(crate) fn set_commit_hook(&self, commit: CommitHook) {
        *self.0.commit.borrow_mut() = Some(commit);
    }

    pub(crate) fn mark_update_pending(&self) {
        self.0.update_pending.set(true);
    }

    pub fn id(&self) -> InstanceId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        self.0.def.name()
    }

    pub fn definition(&self) -> &Rc<ComponentDef> {
        &self.0.def
    }

    pub fn props(&self) -> Rc<dyn ComponentProps> {
        Rc::clone(&self.0.props.borrow())
    }

    /// The props downcast to their concrete type.
    pub fn props_as<P: 'static>(&self) -> Option<Rc<P>> {
        self.props().into_any().downcast::<P>().ok()
    }

    /// The setup result downcast to its concrete type.
    pub fn setup_state<S: 'static>(&self) -> Option<Rc<S>> {
        let state = self.0.setup_state.borrow().clone()?;
        state.downcast::<S>().ok()
    }

    /// The most recently rendered tree.
    pub fn vnode(&self) -> Option<VNode> {
        self.0.vnode.borrow().clone()
    }

    pub fn state(&self) -> InstanceState {
        self.0.state.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.state() == InstanceState::Mounted
    }

    /// Whether a re-render is waiting for the next flush.
    pub fn update_pending(&self) -> bool {
        self.0.update_pending.get()
    }

    pub fn render_effect(&self) -> Option<Effect> {
        self.0.render_effect.borrow().clone()
    }

    /// Number of render passes, failed ones included.
    pub fn render_count(&self) -> usize {
        self.render_effect().map_or(0, |effect| effect.run_count())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("update_pending", &self.update_pending())
            .finish()
    }
}
