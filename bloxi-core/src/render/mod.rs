//! Rendering
//!
//! This module materializes virtual trees into a host and keeps them in
//! sync:
//!
//! - `host`: the `Host` trait and the in-memory `MemoryDom`
//! - `renderer`: mounting and reconciliation
//! - `scheduler`: batched component re-renders

mod dom;
mod host;
mod renderer;
mod scheduler;

pub use host::{Host, MemoryDom, Mutation, NodeId};
pub use renderer::Renderer;
pub use scheduler::UpdateScheduler;
