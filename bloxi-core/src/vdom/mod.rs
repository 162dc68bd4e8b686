//! Virtual DOM
//!
//! Immutable node descriptions and the positional tree diff.

mod diff;
mod node;

pub use diff::{diff, Patch, Path, PropKey, PropPatch};
pub use node::{
    create_vnode, element, h, normalize_event_name, text_node, Child, ComponentBinding, Event,
    EventHandler, Key, NodeProps, PropValue, Style, VNode, VNodeKind,
};
