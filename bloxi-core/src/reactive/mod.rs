//! Reactive Primitives
//!
//! This module implements the core reactive system: state containers,
//! computed values, and effects. These primitives drive every component
//! re-render in Bloxi.
//!
//! # Concepts
//!
//! ## State
//!
//! A `State` is a container for mutable state. When its value is read
//! within a tracking context (such as a computed getter or an effect), the
//! container automatically registers that context as a dependent. When the
//! value changes, all dependents are notified.
//!
//! ## Computed
//!
//! A `Computed` is a derived value that caches its result. It is marked
//! dirty as soon as a dependency changes and re-evaluates on the next read.
//!
//! ## Effects
//!
//! An `Effect` is a side-effecting computation that runs whenever its
//! dependencies change. Component render functions run inside effects.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking stack to automatically
//! detect dependencies. When a container is read, we check if there is an
//! active tracking frame and, if so, register the dependency. Everything is
//! single-threaded: handles are `Rc`-based and not `Send`.

mod computed;
mod context;
mod dep;
mod effect;
mod runtime;
mod state;
mod subscriber;

pub use computed::{computed, Computed};
pub use context::{untrack, ReactiveContext};
pub use dep::DepId;
pub use effect::{effect, on_cleanup, Effect, EffectOptions};
pub use runtime::{batch, NotifyMode, Runtime, RuntimeConfig};
pub use state::{state, State};
pub use subscriber::{SubscriberId, Subscription};
