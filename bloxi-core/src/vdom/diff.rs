//! Tree diff.
//!
//! Compares two virtual trees and produces an edit script. Children are
//! matched by position only: node `i` of the old list is compared with node
//! `i` of the new list, and slots past the end of either list count as
//! absent. Keys are carried on nodes but never consulted here, so moving an
//! item inside a list shows up as a run of per-index patches. That is
//! correct but not minimal.
//!
//! # Rules
//!
//! - Both absent: nothing.
//! - Old absent: replace the subtree at this path.
//! - New absent: remove from the parent path at this index.
//! - Different kinds: replace, never patch across kinds.
//! - Two text nodes: update the text only if it differs.
//! - Same element or component: diff properties (removed, changed, added),
//!   then diff children pairwise up to the longer list's length.

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

use super::node::{EventHandler, NodeProps, PropValue, Style, VNode, VNodeKind};

/// Child indices from the root to a node. The root is the empty path.
pub type Path = SmallVec<[usize; 8]>;

/// Which property a patch touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PropKey {
    ClassName,
    Style,
    Attribute(String),
    Event(String),
    /// The props a component node is mounted with.
    ComponentProps,
}

/// The new value of a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropPatch {
    Text(String),
    Style(Style),
    Value(PropValue),
    Handler(EventHandler),
    ComponentProps,
}

/// One edit-script operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Patch {
    Replace {
        path: Path,
        node: VNode,
    },
    /// Remove child `index` of the node at `parent`. Removing the root is
    /// reported as index 0 of the empty path.
    Remove {
        parent: Path,
        index: usize,
    },
    UpdateText {
        path: Path,
        text: String,
    },
    SetProp {
        path: Path,
        key: PropKey,
        value: PropPatch,
    },
    RemoveProp {
        path: Path,
        key: PropKey,
    },
}

impl Patch {
    /// The path of the node the patch applies to.
    pub fn path(&self) -> Path {
        match self {
            Patch::Replace { path, .. }
            | Patch::UpdateText { path, .. }
            | Patch::SetProp { path, .. }
            | Patch::RemoveProp { path, .. } => path.clone(),
            Patch::Remove { parent, index } => {
                let mut path = parent.clone();
                path.push(*index);
                path
            }
        }
    }
}

/// Diff two optional trees into an edit script.
pub fn diff(old: Option<&VNode>, new: Option<&VNode>) -> Vec<Patch> {
    let mut patches = Vec::new();
    let mut path = Path::new();
    diff_node(old, new, &mut path, &mut patches);
    patches
}

fn diff_node(old: Option<&VNode>, new: Option<&VNode>, path: &mut Path, out: &mut Vec<Patch>) {
    let (old, new) = match (old, new) {
        (None, None) => return,
        (None, Some(new)) => {
            out.push(Patch::Replace {
                path: path.clone(),
                node: new.clone(),
            });
            return;
        }
        (Some(_), None) => {
            let mut parent = path.clone();
            let index = parent.pop().unwrap_or(0);
            out.push(Patch::Remove { parent, index });
            return;
        }
        (Some(old), Some(new)) => (old, new),
    };

    if old.ptr_eq(new) {
        return;
    }

    if !old.same_kind(new) {
        out.push(Patch::Replace {
            path: path.clone(),
            node: new.clone(),
        });
        return;
    }

    match (old.kind(), new.kind()) {
        (VNodeKind::Text(a), VNodeKind::Text(b)) => {
            if a != b {
                out.push(Patch::UpdateText {
                    path: path.clone(),
                    text: b.clone(),
                });
            }
            return;
        }
        (VNodeKind::Component(a), VNodeKind::Component(b)) => {
            if !a.props_eq(b) {
                out.push(Patch::SetProp {
                    path: path.clone(),
                    key: PropKey::ComponentProps,
                    value: PropPatch::ComponentProps,
                });
            }
        }
        _ => {}
    }

    diff_props(old.props(), new.props(), path, out);

    let len = old.children().len().max(new.children().len());
    for i in 0..len {
        path.push(i);
        diff_node(old.children().get(i), new.children().get(i), path, out);
        path.pop();
    }
}

fn diff_props(old: &NodeProps, new: &NodeProps, path: &Path, out: &mut Vec<Patch>) {
    match (&old.class_name, &new.class_name) {
        (Some(_), None) => out.push(Patch::RemoveProp {
            path: path.clone(),
            key: PropKey::ClassName,
        }),
        (previous, Some(class)) if previous.as_ref() != Some(class) => out.push(Patch::SetProp {
            path: path.clone(),
            key: PropKey::ClassName,
            value: PropPatch::Text(class.clone()),
        }),
        _ => {}
    }

    match (&old.style, &new.style) {
        (Some(_), None) => out.push(Patch::RemoveProp {
            path: path.clone(),
            key: PropKey::Style,
        }),
        (previous, Some(style)) if previous.as_ref() != Some(style) => {
            out.push(Patch::SetProp {
                path: path.clone(),
                key: PropKey::Style,
                value: PropPatch::Style(style.clone()),
            })
        }
        _ => {}
    }

    diff_map(
        &old.attributes,
        &new.attributes,
        path,
        out,
        PropKey::Attribute,
        |value| PropPatch::Value(value.clone()),
    );
    diff_map(
        &old.events,
        &new.events,
        path,
        out,
        PropKey::Event,
        |handler| PropPatch::Handler(handler.clone()),
    );
}

/// Removed and changed keys in old order, then added keys in new order.
fn diff_map<V: PartialEq>(
    old: &IndexMap<String, V>,
    new: &IndexMap<String, V>,
    path: &Path,
    out: &mut Vec<Patch>,
    key: fn(String) -> PropKey,
    value: impl Fn(&V) -> PropPatch,
) {
    for (name, old_value) in old {
        match new.get(name) {
            None => out.push(Patch::RemoveProp {
                path: path.clone(),
                key: key(name.clone()),
            }),
            Some(new_value) if new_value != old_value => out.push(Patch::SetProp {
                path: path.clone(),
                key: key(name.clone()),
                value: value(new_value),
            }),
            Some(_) => {}
        }
    }

    for (name, new_value) in new {
        if !old.contains_key(name) {
            out.push(Patch::SetProp {
                path: path.clone(),
                key: key(name.clone()),
                value: value(new_value),
            });
        }
    }
}
