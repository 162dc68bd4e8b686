//! Host DOM abstraction.
//!
//! The renderer never touches a platform DOM directly. It drives a `Host`,
//! which owns the real nodes and hands out cheap node handles. `MemoryDom`
//! is the bundled host: an arena of element and text nodes that records
//! every mutation, used for headless rendering and for checking that a
//! re-render touched only what changed.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;

use crate::vdom::EventHandler;

/// A platform DOM the renderer can drive.
pub trait Host {
    /// Handle to one host node.
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    fn create_element(&mut self, tag: &str) -> Self::Node;
    fn create_text(&mut self, text: &str) -> Self::Node;
    fn set_text(&mut self, node: &Self::Node, text: &str);

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    /// Set one inline style declaration.
    fn set_style(&mut self, node: &Self::Node, name: &str, value: &str);
    /// Remove every inline style declaration.
    fn clear_style(&mut self, node: &Self::Node);

    fn add_event_listener(&mut self, node: &Self::Node, event: &str, handler: EventHandler);
    fn remove_event_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler);
    /// Listeners currently bound to `event` on `node`.
    fn listeners(&self, node: &Self::Node, event: &str) -> Vec<EventHandler>;

    /// Append `child`, detaching it from any previous parent.
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node);
    /// Put `new_child` where `old_child` is.
    fn replace_child(&mut self, parent: &Self::Node, new_child: &Self::Node, old_child: &Self::Node);
    fn parent_of(&self, node: &Self::Node) -> Option<Self::Node>;
}

/// Handle to a `MemoryDom` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetText { node: NodeId, text: String },
    SetAttribute { node: NodeId, name: String, value: String },
    RemoveAttribute { node: NodeId, name: String },
    SetStyle { node: NodeId, name: String, value: String },
    ClearStyle { node: NodeId },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    AppendChild { parent: NodeId, child: NodeId },
    RemoveChild { parent: NodeId, child: NodeId },
    ReplaceChild { parent: NodeId, new_child: NodeId, old_child: NodeId },
}

#[derive(Default)]
struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    listeners: IndexMap<String, Vec<EventHandler>>,
    children: Vec<NodeId>,
}

enum NodeData {
    Element(ElementData),
    Text(String),
}

struct MemoryNode {
    data: NodeData,
    parent: Option<NodeId>,
}

/// In-memory host DOM.
///
/// # Example
///
/// ```rust
/// use bloxi_core::render::{Host, MemoryDom};
///
/// let mut dom = MemoryDom::new();
/// let root = dom.create_element("div");
/// let text = dom.create_text("hello");
/// dom.append_child(&root, &text);
///
/// assert_eq!(dom.to_html(root), "<div>hello</div>");
/// ```
#[derive(Default)]
pub struct MemoryDom {
    nodes: Vec<MemoryNode>,
    mutations: Vec<Mutation>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode { data, parent: None });
        id
    }

    fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(element) = self.element_mut(parent) {
            element.children.retain(|c| *c != child);
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = None;
        }
    }

    fn log(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Every mutation since creation or the last `take_mutations`.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attributes.get(name).map(String::as_str)
    }

    pub fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.style.get(name).map(String::as_str)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        match self.element(node) {
            Some(element) => &element.children,
            None => &[],
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.element(node)
            .and_then(|e| e.listeners.get(event))
            .map_or(0, Vec::len)
    }

    /// Concatenated text content of a subtree.
    pub fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element(element)) => {
                for child in &element.children {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Serialize a subtree as HTML. Listeners are not rendered.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Text(text)) => out.push_str(&escape(text)),
            Some(NodeData::Element(element)) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(value));
                        out.push('"');
                    }
                }
                if !element.style.is_empty() {
                    let declarations: Vec<String> = element
                        .style
                        .iter()
                        .map(|(k, v)| format!("{k}: {v}"))
                        .collect();
                    out.push_str(" style=\"");
                    out.push_str(&escape(&declarations.join("; ")));
                    out.push('"');
                }
                out.push('>');
                for child in &element.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
            None => {}
        }
    }

    /// A JSON description of a subtree, listeners included by event name.
    pub fn snapshot(&self, node: NodeId) -> serde_json::Value {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Text(text)) => json!({ "text": text }),
            Some(NodeData::Element(element)) => {
                let children: Vec<serde_json::Value> =
                    element.children.iter().map(|c| self.snapshot(*c)).collect();
                let listeners: Vec<&str> = element
                    .listeners
                    .iter()
                    .filter(|(_, handlers)| !handlers.is_empty())
                    .map(|(event, _)| event.as_str())
                    .collect();
                json!({
                    "tag": element.tag,
                    "attributes": element.attributes,
                    "style": element.style,
                    "listeners": listeners,
                    "children": children,
                })
            }
            None => serde_json::Value::Null,
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl Host for MemoryDom {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str) -> NodeId {
        let node = self.push(NodeData::Element(ElementData {
            tag: tag.to_owned(),
            ..ElementData::default()
        }));
        self.log(Mutation::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let node = self.push(NodeData::Text(text.to_owned()));
        self.log(Mutation::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        if let Some(MemoryNode {
            data: NodeData::Text(current),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *current = text.to_owned();
            self.log(Mutation::SetText {
                node: *node,
                text: text.to_owned(),
            });
        }
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(*node) {
            element.attributes.insert(name.to_owned(), value.to_owned());
            self.log(Mutation::SetAttribute {
                node: *node,
                name: name.to_owned(),
                value: value.to_owned(),
            });
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        if let Some(element) = self.element_mut(*node) {
            element.attributes.shift_remove(name);
            self.log(Mutation::RemoveAttribute {
                node: *node,
                name: name.to_owned(),
            });
        }
    }

    fn set_style(&mut self, node: &NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(*node) {
            element.style.insert(name.to_owned(), value.to_owned());
            self.log(Mutation::SetStyle {
                node: *node,
                name: name.to_owned(),
                value: value.to_owned(),
            });
        }
    }

    fn clear_style(&mut self, node: &NodeId) {
        if let Some(element) = self.element_mut(*node) {
            element.style.clear();
            self.log(Mutation::ClearStyle { node: *node });
        }
    }

    fn add_event_listener(&mut self, node: &NodeId, event: &str, handler: EventHandler) {
        if let Some(element) = self.element_mut(*node) {
            element
                .listeners
                .entry(event.to_owned())
                .or_default()
                .push(handler);
            self.log(Mutation::AddListener {
                node: *node,
                event: event.to_owned(),
            });
        }
    }

    fn remove_event_listener(&mut self, node: &NodeId, event: &str, handler: &EventHandler) {
        let removed = self
            .element_mut(*node)
            .and_then(|element| element.listeners.get_mut(event))
            .and_then(|handlers| {
                let index = handlers.iter().position(|h| h.ptr_eq(handler))?;
                handlers.remove(index);
                Some(())
            });
        if removed.is_some() {
            self.log(Mutation::RemoveListener {
                node: *node,
                event: event.to_owned(),
            });
        }
    }

    fn listeners(&self, node: &NodeId, event: &str) -> Vec<EventHandler> {
        self.element(*node)
            .and_then(|element| element.listeners.get(event))
            .cloned()
            .unwrap_or_default()
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        if self.element(*parent).is_none() || self.node(*child).is_none() {
            return;
        }
        self.detach(*child);
        if let Some(element) = self.element_mut(*parent) {
            element.children.push(*child);
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(*parent);
        }
        self.log(Mutation::AppendChild {
            parent: *parent,
            child: *child,
        });
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
        if self.parent(*child) != Some(*parent) {
            return;
        }
        self.detach(*child);
        self.log(Mutation::RemoveChild {
            parent: *parent,
            child: *child,
        });
    }

    fn replace_child(&mut self, parent: &NodeId, new_child: &NodeId, old_child: &NodeId) {
        if self.parent(*old_child) != Some(*parent) || self.node(*new_child).is_none() {
            return;
        }
        self.detach(*new_child);
        let Some(index) = self
            .element(*parent)
            .and_then(|e| e.children.iter().position(|c| c == old_child))
        else {
            return;
        };
        if let Some(element) = self.element_mut(*parent) {
            element.children[index] = *new_child;
        }
        if let Some(node) = self.nodes.get_mut(old_child.0) {
            node.parent = None;
        }
        if let Some(node) = self.nodes.get_mut(new_child.0) {
            node.parent = Some(*parent);
        }
        self.log(Mutation::ReplaceChild {
            parent: *parent,
            new_child: *new_child,
            old_child: *old_child,
        });
    }

    fn parent_of(&self, node: &NodeId) -> Option<NodeId> {
        self.parent(*node)
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDom")
            .field("nodes", &self.nodes.len())
            .field("mutations", &self.mutations.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
