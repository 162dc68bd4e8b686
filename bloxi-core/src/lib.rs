//! Bloxi Core
//!
//! This crate provides the core runtime for the Bloxi reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (state, computed values, effects)
//! - An immutable virtual DOM with a structural diff
//! - A component model with setup, render and lifecycle hooks
//! - A renderer that reconciles virtual trees into a host DOM
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: State containers, dependency tracking and the microtask runtime
//! - `vdom`: VNode construction and the patch-producing diff
//! - `component`: Component definitions, instances and lifecycle hooks
//! - `render`: The host abstraction, reconciler and update scheduler
//! - `error`: The crate-wide error type
//!
//! Everything is single-threaded. Handles are `Rc`-based, and the embedder
//! drives time by calling `Runtime::tick` at the end of each synchronous
//! turn.
//!
//! # Example
//!
//! ```rust
//! use bloxi_core::render::{Host, MemoryDom};
//! use bloxi_core::vdom::NodeProps;
//! use bloxi_core::{component, h, state, ComponentOptions, Renderer, Runtime};
//!
//! let count = state(0);
//!
//! let counter = component(ComponentOptions::<()>::new("Counter").render({
//!     let count = count.clone();
//!     move |_, _| h!("span", NodeProps::new().class("count"), count.get())
//! }))
//! .unwrap();
//!
//! let renderer = Renderer::new(MemoryDom::new());
//! let root = renderer.with_host(|dom| dom.create_element("div"));
//! renderer.render(&counter.node(()), &root).unwrap();
//!
//! count.set(1);
//! Runtime::tick().unwrap();
//!
//! let html = renderer.with_host(|dom| dom.to_html(root));
//! assert_eq!(html, r#"<div><span class="count">1</span></div>"#);
//! ```

pub mod component;
pub mod error;
pub mod reactive;
pub mod render;
pub mod vdom;

pub use component::{component, on_mount, on_unmount, on_update, ComponentOptions};
pub use error::{Error, RenderError, Result};
pub use reactive::{batch, computed, effect, on_cleanup, state, untrack, Runtime};
pub use render::Renderer;
pub use vdom::{create_vnode, diff, text_node, Patch, VNode};
