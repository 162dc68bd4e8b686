//! Component Model
//!
//! Components pair a `setup` function, run once per mounted instance, with
//! a `render` function that runs inside a reactive effect. Whatever `render`
//! reads becomes a dependency; when one changes the instance is queued for
//! re-render on the update scheduler.
//!
//! # Lifecycle
//!
//! ```text
//! Created --(setup, first render)--> Mounted --(re-render)*--> Mounted
//!                                       |
//!                                       +--(before_unmount, dispose)--> Unmounted
//! ```
//!
//! `mounted` and `updated` hooks run at the microtask boundary after the
//! render that caused them, never inside the render pass itself.

mod definition;
mod instance;
mod lifecycle;

pub use definition::{
    component, ComponentDef, ComponentFactory, ComponentId, ComponentOptions, ComponentProps,
    ComponentRegistry,
};
pub use instance::{ComponentInstance, InstanceId, InstanceState};
pub use lifecycle::{
    current_instance, on_mount, on_unmount, on_update, LifecycleHooks, LifecyclePhase,
};

pub(crate) use instance::CommitHook;
pub(crate) use lifecycle::adopt_effect;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
