//! Virtual DOM nodes.
//!
//! A `VNode` is an immutable description of one UI node: a host element, a
//! text run, or a component to be mounted. Nodes are produced fresh by
//! every render and shared through `Rc`, so cloning a tree is cheap and two
//! clones are recognisably the same node (`VNode::ptr_eq`).
//!
//! Properties are structured rather than a string-keyed bag: class name,
//! style map, event handlers, plain attributes, and a key live in their own
//! fields of `NodeProps`. The component binding (definition + props) lives in
//! the node kind, never alongside ordinary properties.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::component::{ComponentDef, ComponentProps};

/// Inline style declarations, in insertion order.
pub type Style = IndexMap<String, String>;

/// A plain attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => Ok(()),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Str(s) => f.write_str(s),
        }
    }
}

macro_rules! prop_value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(value: $ty) -> Self {
                PropValue::Int(value as i64)
            }
        })*
    };
}

prop_value_from_int!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f32> for PropValue {
    fn from(value: f32) -> Self {
        PropValue::Float(f64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropValue::Null, Into::into)
    }
}

/// Identity hint carried on a node. Positional diffing ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

/// A dispatched host event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name without the `on` prefix, e.g. `click`.
    pub name: String,
    /// Payload for value-carrying events such as `input`.
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A shared event listener. Two handlers are equal only if they are the
/// same allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

impl Serialize for EventHandler {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[handler]")
    }
}

/// Normalise `onClick` style names to `click`. Plain names pass through.
pub fn normalize_event_name(name: &str) -> String {
    match name.strip_prefix("on") {
        Some(rest) if rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()) => {
            rest.to_ascii_lowercase()
        }
        _ => name.to_owned(),
    }
}

/// Structured node properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeProps {
    pub class_name: Option<String>,
    pub style: Option<Style>,
    pub events: IndexMap<String, EventHandler>,
    pub attributes: IndexMap<String, PropValue>,
    pub key: Option<Key>,
}

impl NodeProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Add one style declaration.
    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.style
            .get_or_insert_with(Style::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attach a listener. Accepts `click` or `onClick`.
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.events
            .insert(normalize_event_name(event), EventHandler::new(handler));
        self
    }

    pub fn on_handler(mut self, event: &str, handler: EventHandler) -> Self {
        self.events.insert(normalize_event_name(event), handler);
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// The component a node stands for, together with the props to mount it
/// with.
#[derive(Clone)]
pub struct ComponentBinding {
    pub(crate) def: Rc<ComponentDef>,
    pub(crate) props: Rc<dyn ComponentProps>,
}

impl ComponentBinding {
    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn definition(&self) -> &Rc<ComponentDef> {
        &self.def
    }

    pub fn props(&self) -> &Rc<dyn ComponentProps> {
        &self.props
    }

    pub fn same_definition(&self, other: &Self) -> bool {
        self.def.id() == other.def.id()
    }

    /// Structural props equality.
    pub fn props_eq(&self, other: &Self) -> bool {
        (*self.props).props_eq(&*other.props)
    }
}

impl PartialEq for ComponentBinding {
    fn eq(&self, other: &Self) -> bool {
        self.same_definition(other) && self.props_eq(other)
    }
}

impl fmt::Debug for ComponentBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBinding")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Node kind discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum VNodeKind {
    /// A host element with the given tag.
    Element(String),
    /// A text run.
    Text(String),
    /// A component to mount.
    Component(ComponentBinding),
}

impl VNodeKind {
    /// Whether two kinds can be patched in place rather than replaced.
    ///
    /// Text nodes always match each other, elements match on tag, and
    /// components match on definition.
    pub fn same_kind(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeKind::Element(a), VNodeKind::Element(b)) => a == b,
            (VNodeKind::Text(_), VNodeKind::Text(_)) => true,
            (VNodeKind::Component(a), VNodeKind::Component(b)) => a.same_definition(b),
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq)]
struct VNodeData {
    kind: VNodeKind,
    props: NodeProps,
    children: Vec<VNode>,
}

/// An immutable virtual DOM node.
#[derive(Clone, PartialEq)]
pub struct VNode(Rc<VNodeData>);

impl VNode {
    pub(crate) fn from_parts(kind: VNodeKind, props: NodeProps, children: Vec<VNode>) -> Self {
        Self(Rc::new(VNodeData {
            kind,
            props,
            children,
        }))
    }

    pub fn kind(&self) -> &VNodeKind {
        &self.0.kind
    }

    pub fn props(&self) -> &NodeProps {
        &self.0.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.0.children
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            VNodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.0.kind {
            VNodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn component(&self) -> Option<&ComponentBinding> {
        match &self.0.kind {
            VNodeKind::Component(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.kind, VNodeKind::Text(_))
    }

    pub fn is_component(&self) -> bool {
        matches!(self.0.kind, VNodeKind::Component(_))
    }

    pub fn same_kind(&self, other: &VNode) -> bool {
        self.0.kind.same_kind(&other.0.kind)
    }

    /// Whether both handles refer to the same node allocation.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            VNodeKind::Text(text) => write!(f, "{text:?}"),
            VNodeKind::Element(tag) => f
                .debug_struct(tag)
                .field("props", &self.0.props)
                .field("children", &self.0.children)
                .finish(),
            VNodeKind::Component(binding) => write!(f, "<{}>", binding.name()),
        }
    }
}

impl Serialize for VNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0.kind {
            VNodeKind::Text(text) => {
                let mut s = serializer.serialize_struct("VNode", 2)?;
                s.serialize_field("kind", "text")?;
                s.serialize_field("text", text)?;
                s.end()
            }
            VNodeKind::Component(binding) => {
                let mut s = serializer.serialize_struct("VNode", 2)?;
                s.serialize_field("kind", "component")?;
                s.serialize_field("name", binding.name())?;
                s.end()
            }
            VNodeKind::Element(tag) => {
                let props = &self.0.props;
                let events: Vec<&str> = props.events.keys().map(String::as_str).collect();
                let mut s = serializer.serialize_struct("VNode", 7)?;
                s.serialize_field("kind", "element")?;
                s.serialize_field("tag", tag)?;
                s.serialize_field("class", &props.class_name)?;
                s.serialize_field("style", &props.style)?;
                s.serialize_field("attributes", &props.attributes)?;
                s.serialize_field("events", &events)?;
                s.serialize_field("children", &self.0.children)?;
                s.end()
            }
        }
    }
}

/// One entry of a children list before normalisation.
#[derive(Debug, Clone)]
pub enum Child {
    Node(VNode),
    Text(String),
    /// Flattened in place.
    Many(Vec<Child>),
    /// Dropped.
    Empty,
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&VNode> for Child {
    fn from(node: &VNode) -> Self {
        Child::Node(node.clone())
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_owned())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Text(text.clone())
    }
}

macro_rules! child_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(value: $ty) -> Self {
                Child::Text(value.to_string())
            }
        })*
    };
}

child_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(values: Vec<T>) -> Self {
        Child::Many(values.into_iter().map(Into::into).collect())
    }
}

fn flatten_into(child: Child, out: &mut Vec<VNode>) {
    match child {
        Child::Node(node) => out.push(node),
        Child::Text(text) => out.push(text_node(text)),
        Child::Many(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
        Child::Empty => {}
    }
}

/// Build a node, normalising children: text and numbers become text nodes,
/// empty entries are dropped, nested lists are flattened.
pub fn create_vnode<I>(kind: VNodeKind, props: NodeProps, children: I) -> VNode
where
    I: IntoIterator<Item = Child>,
{
    let mut normalized = Vec::new();
    for child in children {
        flatten_into(child, &mut normalized);
    }
    VNode::from_parts(kind, props, normalized)
}

/// Build a host element node.
pub fn h<I>(tag: &str, props: NodeProps, children: I) -> VNode
where
    I: IntoIterator<Item = Child>,
{
    create_vnode(VNodeKind::Element(tag.to_owned()), props, children)
}

/// Build a text node.
pub fn text_node(text: impl Into<String>) -> VNode {
    VNode::from_parts(VNodeKind::Text(text.into()), NodeProps::default(), Vec::new())
}

/// Build an element with no props or children.
pub fn element(tag: &str) -> VNode {
    h(tag, NodeProps::default(), std::iter::empty())
}

/// Build an element node with heterogeneous children.
///
/// ```rust
/// use bloxi_core::h;
/// use bloxi_core::vdom::NodeProps;
///
/// let count = 3;
/// let node = h!("p", NodeProps::new().class("count"), "Count: ", count);
/// assert_eq!(node.children().len(), 2);
/// ```
#[macro_export]
macro_rules! h {
    ($tag:expr) => {
        $crate::vdom::element($tag)
    };
    ($tag:expr, $props:expr) => {
        $crate::vdom::h($tag, $props, ::std::iter::empty())
    };
    ($tag:expr, $props:expr, $($child:expr),+ $(,)?) => {
        $crate::vdom::h($tag, $props, [$($crate::vdom::Child::from($child)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_become_text_nodes_and_empties_drop() {
        let node = h(
            "div",
            NodeProps::new(),
            [
                Child::from("hello"),
                Child::from(42),
                Child::from(None::<&str>),
                Child::from(element("span")),
            ],
        );

        let children = node.children();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].text(), Some("hello"));
        assert_eq!(children[1].text(), Some("42"));
        assert_eq!(children[2].tag(), Some("span"));
    }

    #[test]
    fn nested_lists_are_flattened() {
        let items = vec!["a", "b", "c"];
        let node = crate::h!("ul", NodeProps::new(), "first", items);
        let texts: Vec<_> = node.children().iter().filter_map(VNode::text).collect();
        assert_eq!(texts, vec!["first", "a", "b", "c"]);
    }

    #[test]
    fn event_names_are_normalized() {
        assert_eq!(normalize_event_name("onClick"), "click");
        assert_eq!(normalize_event_name("click"), "click");
        assert_eq!(normalize_event_name("online"), "online");

        let props = NodeProps::new().on("onInput", |_| {});
        assert!(props.events.contains_key("input"));
    }

    #[test]
    fn same_kind_rules() {
        assert!(element("div").same_kind(&element("div")));
        assert!(!element("div").same_kind(&element("span")));
        assert!(text_node("a").same_kind(&text_node("b")));
        assert!(!text_node("a").same_kind(&element("a")));
    }

    #[test]
    fn prop_values_stringify() {
        assert_eq!(PropValue::from(3).to_string(), "3");
        assert_eq!(PropValue::from("x").to_string(), "x");
        assert_eq!(PropValue::from(true).to_string(), "true");
        assert_eq!(PropValue::from(None::<i32>), PropValue::Null);
    }

    #[test]
    fn vnode_serializes_to_json() {
        let node = crate::h!(
            "button",
            NodeProps::new().class("primary").on("click", |_| {}),
            "Go"
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["tag"], "button");
        assert_eq!(json["class"], "primary");
        assert_eq!(json["events"][0], "click");
        assert_eq!(json["children"][0]["text"], "Go");
    }
}
