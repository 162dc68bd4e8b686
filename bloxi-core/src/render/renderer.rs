//! Renderer / Reconciler
//!
//! The renderer turns virtual trees into host nodes and keeps them in sync.
//! It owns a shadow tree of `DomInstance` records, one per materialized
//! node, pairing the VNode last committed at that position with the host
//! node it produced.
//!
//! # How Reconciliation Works
//!
//! `reconcile(parent, previous, next)` handles four cases:
//!
//! 1. No previous record: build a new subtree and append it to `parent`.
//! 2. No next node: unmount the subtree (components included) and detach
//!    it from `parent`.
//! 3. Same kind: patch in place. Text nodes update their text, elements
//!    apply property changes and reconcile children by index, components
//!    receive their new props.
//! 4. Different kinds: build the replacement first, substitute it for the
//!    old host node, then unmount the old subtree.
//!
//! # Components
//!
//! A component record has no host node of its own. It holds exactly one
//! child record, the materialization of the instance's latest render, and
//! its host node is that child's host node. When a scheduled update
//! re-renders the instance, the commit hook installed here reconciles the
//! child record against the new tree straight away.
//!
//! # Drift
//!
//! If a record's host node is no longer a child of its recorded parent,
//! replacement falls back to appending and removal is skipped. Both are
//! logged as warnings and never fail the render.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use super::dom::{DomInstance, DomRef};
use super::host::Host;
use crate::component::ComponentInstance;
use crate::error::Result;
use crate::vdom::{text_node, Event, NodeProps, PropValue, VNode, VNodeKind};

struct Root<N> {
    container: N,
    record: DomRef<N>,
}

struct RendererInner<H: Host> {
    host: RefCell<H>,
    root: RefCell<Option<Root<H::Node>>>,
}

/// Mounts virtual trees into a host and keeps them up to date.
///
/// # Example
///
/// ```rust
/// use bloxi_core::h;
/// use bloxi_core::render::{Host, MemoryDom, Renderer};
/// use bloxi_core::vdom::NodeProps;
///
/// let renderer = Renderer::new(MemoryDom::new());
/// let container = renderer.with_host(|dom| dom.create_element("main"));
///
/// renderer
///     .render(&h!("p", NodeProps::new().class("lead"), "hello"), &container)
///     .unwrap();
///
/// let html = renderer.with_host(|dom| dom.to_html(container));
/// assert_eq!(html, r#"<main><p class="lead">hello</p></main>"#);
/// ```
pub struct Renderer<H: Host + 'static> {
    inner: Rc<RendererInner<H>>,
}

impl<H: Host + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                host: RefCell::new(host),
                root: RefCell::new(None),
            }),
        }
    }

    /// Borrow the host, e.g. to create a container or inspect the result.
    ///
    /// Do not call back into the renderer from `f`.
    pub fn with_host<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.host.borrow_mut())
    }

    fn host(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    /// Render `vnode` as the root of `container`.
    ///
    /// A second call with the same container reconciles against the
    /// previous root. Rendering into a different container unmounts the
    /// previous root first.
    pub fn render(&self, vnode: &VNode, container: &H::Node) -> Result<()> {
        let previous = self.inner.root.borrow_mut().take();
        let previous = match previous {
            Some(root) if root.container == *container => Some(root.record),
            Some(root) => {
                tracing::debug!(?container, "render target changed; unmounting previous root");
                self.unmount(&root.record);
                self.detach(&root.container, &root.record);
                None
            }
            None => None,
        };

        let fallback = previous.clone();
        match self.reconcile(container, previous, Some(vnode)) {
            Ok(record) => {
                *self.inner.root.borrow_mut() = record.map(|record| Root {
                    container: container.clone(),
                    record,
                });
                Ok(())
            }
            Err(error) => {
                *self.inner.root.borrow_mut() = fallback.map(|record| Root {
                    container: container.clone(),
                    record,
                });
                Err(error)
            }
        }
    }

    /// Unmount the current root and remove it from its container.
    pub fn unmount_root(&self) {
        let root = self.inner.root.borrow_mut().take();
        if let Some(root) = root {
            self.unmount(&root.record);
            self.detach(&root.container, &root.record);
        }
    }

    /// The host node at the top of the current root.
    pub fn root_node(&self) -> Option<H::Node> {
        let root = self.inner.root.borrow();
        root.as_ref().and_then(|root| root.record.borrow().dom_node())
    }

    /// The component instance at the root, if the root is a component.
    pub fn root_instance(&self) -> Option<ComponentInstance> {
        let root = self.inner.root.borrow();
        root.as_ref()
            .and_then(|root| root.record.borrow().instance.clone())
    }

    /// Deliver `event` to the listeners bound on `node`. Returns how many
    /// listeners ran.
    pub fn dispatch(&self, node: &H::Node, event: &Event) -> usize {
        let handlers = self.host().listeners(node, &event.name);
        for handler in &handlers {
            handler.call(event);
        }
        handlers.len()
    }

    fn reconcile(
        &self,
        parent: &H::Node,
        previous: Option<DomRef<H::Node>>,
        next: Option<&VNode>,
    ) -> Result<Option<DomRef<H::Node>>> {
        match (previous, next) {
            (None, None) => Ok(None),
            (None, Some(vnode)) => {
                let record = self.create(parent, vnode)?;
                let node = record.borrow().dom_node();
                if let Some(node) = node {
                    self.host().append_child(parent, &node);
                }
                Ok(Some(record))
            }
            (Some(record), None) => {
                self.unmount(&record);
                self.detach(parent, &record);
                Ok(None)
            }
            (Some(record), Some(vnode)) => {
                let same_kind = record.borrow().vnode.same_kind(vnode);
                if same_kind {
                    self.patch(&record, vnode)?;
                    return Ok(Some(record));
                }

                let replacement = self.create(parent, vnode)?;
                let old_node = record.borrow().dom_node();
                let new_node = replacement.borrow().dom_node();
                if let (Some(old_node), Some(new_node)) = (old_node, new_node) {
                    self.substitute(parent, &new_node, &old_node);
                }
                self.unmount(&record);
                Ok(Some(replacement))
            }
        }
    }

    /// Build a detached subtree for `vnode`. `parent` is recorded as the
    /// node it will be attached to.
    fn create(&self, parent: &H::Node, vnode: &VNode) -> Result<DomRef<H::Node>> {
        match vnode.kind() {
            VNodeKind::Text(text) => {
                let node = self.host().create_text(text);
                Ok(DomInstance::host(vnode.clone(), node, parent.clone(), Vec::new()))
            }
            VNodeKind::Element(tag) => {
                let node = self.host().create_element(tag);
                self.apply_props(&node, &NodeProps::default(), vnode.props());

                let mut children = Vec::with_capacity(vnode.children().len());
                for child in vnode.children() {
                    let record = match self.create(&node, child) {
                        Ok(record) => record,
                        Err(error) => {
                            for created in &children {
                                self.unmount(created);
                            }
                            return Err(error);
                        }
                    };
                    let child_node = record.borrow().dom_node();
                    if let Some(child_node) = child_node {
                        self.host().append_child(&node, &child_node);
                    }
                    children.push(record);
                }

                Ok(DomInstance::host(vnode.clone(), node, parent.clone(), children))
            }
            VNodeKind::Component(binding) => {
                let instance = ComponentInstance::mount(binding)?;
                // A successful mount always stores a rendered tree.
                let rendered = instance.vnode().unwrap_or_else(|| text_node(""));
                let child = match self.create(parent, &rendered) {
                    Ok(child) => child,
                    Err(error) => {
                        instance.unmount();
                        return Err(error);
                    }
                };

                let record = DomInstance::component(
                    vnode.clone(),
                    instance.clone(),
                    parent.clone(),
                    child,
                );
                self.install_commit_hook(&instance, &record);
                Ok(record)
            }
        }
    }

    fn patch(&self, record: &DomRef<H::Node>, vnode: &VNode) -> Result<()> {
        let previous = record.borrow().vnode.clone();
        if previous.ptr_eq(vnode) {
            return Ok(());
        }

        let result = match vnode.kind() {
            VNodeKind::Text(text) => {
                let node = record.borrow().node.clone();
                if let Some(node) = node {
                    if previous.text() != Some(text.as_str()) {
                        self.host().set_text(&node, text);
                    }
                }
                Ok(())
            }
            VNodeKind::Element(_) => {
                let node = record.borrow().node.clone();
                match node {
                    Some(node) => {
                        self.apply_props(&node, previous.props(), vnode.props());
                        let old_children = std::mem::take(&mut record.borrow_mut().children);
                        let mut children = Vec::with_capacity(vnode.children().len());
                        let result =
                            self.update_children(&node, old_children, vnode.children(), &mut children);
                        record.borrow_mut().children = children;
                        result
                    }
                    None => Ok(()),
                }
            }
            VNodeKind::Component(binding) => {
                let instance = record.borrow().instance.clone();
                match instance {
                    Some(instance) => {
                        instance.update_props(Rc::clone(binding.props()));
                        self.refresh_component(record, &instance)
                    }
                    None => Ok(()),
                }
            }
        };

        record.borrow_mut().vnode = vnode.clone();
        result
    }

    /// Reconcile children pairwise by index. On failure the records not yet
    /// processed are kept in `out` untouched.
    fn update_children(
        &self,
        node: &H::Node,
        old_children: Vec<DomRef<H::Node>>,
        next: &[VNode],
        out: &mut Vec<DomRef<H::Node>>,
    ) -> Result<()> {
        let len = old_children.len().max(next.len());
        let mut old_children = old_children.into_iter();

        for index in 0..len {
            let previous = old_children.next();
            let fallback = previous.clone();
            match self.reconcile(node, previous, next.get(index)) {
                Ok(Some(record)) => out.push(record),
                Ok(None) => {}
                Err(error) => {
                    out.extend(fallback);
                    out.extend(old_children);
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Bring a component record's child up to the instance's latest tree if
    /// it is stale.
    fn refresh_component(&self, record: &DomRef<H::Node>, instance: &ComponentInstance) -> Result<()> {
        let Some(rendered) = instance.vnode() else {
            return Ok(());
        };
        let stale = record
            .borrow()
            .children
            .first()
            .map_or(true, |child| !child.borrow().vnode.ptr_eq(&rendered));
        if stale {
            self.commit_component(record, &rendered)?;
        }
        Ok(())
    }

    fn commit_component(&self, record: &DomRef<H::Node>, next: &VNode) -> Result<()> {
        let (parent, child) = {
            let record = record.borrow();
            (record.parent.clone(), record.children.first().cloned())
        };
        let child = self.reconcile(&parent, child, Some(next))?;
        record.borrow_mut().children = child.into_iter().collect();
        Ok(())
    }

    fn install_commit_hook(&self, instance: &ComponentInstance, record: &DomRef<H::Node>) {
        let renderer = Rc::downgrade(&self.inner);
        let target = Rc::downgrade(record);
        instance.set_commit_hook(Rc::new(move |_previous: &VNode, next: &VNode| {
            match (renderer.upgrade(), target.upgrade()) {
                (Some(inner), Some(record)) => Renderer { inner }.commit_component(&record, next),
                _ => Ok(()),
            }
        }));
    }

    /// Unmount every component in a subtree. Host nodes are left in place.
    fn unmount(&self, record: &DomRef<H::Node>) {
        let (instance, children) = {
            let record = record.borrow();
            (record.instance.clone(), record.children.clone())
        };
        if let Some(instance) = instance {
            instance.unmount();
        }
        for child in &children {
            self.unmount(child);
        }
    }

    /// Remove a record's host node from `parent`, if it is still there.
    fn detach(&self, parent: &H::Node, record: &DomRef<H::Node>) {
        let Some(node) = record.borrow().dom_node() else {
            return;
        };
        let mut host = self.host();
        if host.parent_of(&node).as_ref() == Some(parent) {
            host.remove_child(parent, &node);
        } else {
            tracing::warn!(?node, ?parent, "node is no longer attached to its parent; skipping removal");
        }
    }

    fn substitute(&self, parent: &H::Node, new_node: &H::Node, old_node: &H::Node) {
        let mut host = self.host();
        if host.parent_of(old_node).as_ref() == Some(parent) {
            host.replace_child(parent, new_node, old_node);
        } else {
            tracing::warn!(?old_node, ?parent, "replaced node is detached; appending instead");
            host.append_child(parent, new_node);
        }
    }

    fn apply_props(&self, node: &H::Node, old: &NodeProps, new: &NodeProps) {
        let mut host = self.host();

        if old.class_name != new.class_name {
            match &new.class_name {
                Some(class) => host.set_attribute(node, "class", class),
                None => host.remove_attribute(node, "class"),
            }
        }

        match (&old.style, &new.style) {
            (Some(_), None) => host.clear_style(node),
            (previous, Some(style)) => {
                for (name, value) in style {
                    let unchanged = previous
                        .as_ref()
                        .and_then(|previous| previous.get(name))
                        .is_some_and(|old_value| old_value == value);
                    if !unchanged {
                        host.set_style(node, name, value);
                    }
                }
            }
            (None, None) => {}
        }

        for (event, handler) in &old.events {
            if new.events.get(event) != Some(handler) {
                host.remove_event_listener(node, event, handler);
            }
        }
        for (event, handler) in &new.events {
            if old.events.get(event) != Some(handler) {
                host.add_event_listener(node, event, handler.clone());
            }
        }

        for name in old.attributes.keys() {
            if !new.attributes.contains_key(name) {
                host.remove_attribute(node, name);
            }
        }
        for (name, value) in &new.attributes {
            if old.attributes.get(name) == Some(value) {
                continue;
            }
            match value {
                PropValue::Bool(true) => host.set_attribute(node, name, ""),
                PropValue::Bool(false) | PropValue::Null => host.remove_attribute(node, name),
                other => host.set_attribute(node, name, &other.to_string()),
            }
        }
    }
}

impl<H: Host + 'static> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h;
    use crate::render::{MemoryDom, Mutation, NodeId};
    use crate::vdom::{element, text_node};

    fn setup() -> (Renderer<MemoryDom>, NodeId) {
        let renderer = Renderer::new(MemoryDom::new());
        let container = renderer.with_host(|dom| dom.create_element("body"));
        (renderer, container)
    }

    fn html(renderer: &Renderer<MemoryDom>, container: NodeId) -> String {
        renderer.with_host(|dom| dom.to_html(container))
    }

    fn take_mutations(renderer: &Renderer<MemoryDom>) -> Vec<Mutation> {
        renderer.with_host(|dom| dom.take_mutations())
    }

    #[test]
    fn initial_render_builds_tree() {
        let (renderer, container) = setup();
        let tree = h!(
            "div",
            NodeProps::new().class("card").style("color", "red"),
            h!("span", NodeProps::new().attr("title", "t"), "a"),
            "b"
        );

        renderer.render(&tree, &container).unwrap();
        assert_eq!(
            html(&renderer, container),
            r#"<body><div class="card" style="color: red"><span title="t">a</span>b</div></body>"#
        );
    }

    #[test]
    fn rerender_patches_only_changed_text() {
        let (renderer, container) = setup();
        renderer
            .render(&h!("p", NodeProps::new(), "0"), &container)
            .unwrap();
        let paragraph = renderer.root_node().unwrap();
        take_mutations(&renderer);

        renderer
            .render(&h!("p", NodeProps::new(), "1"), &container)
            .unwrap();

        let mutations = take_mutations(&renderer);
        assert!(matches!(&mutations[..], [Mutation::SetText { text, .. }] if text == "1"));
        assert_eq!(renderer.root_node(), Some(paragraph));
    }

    #[test]
    fn kind_change_replaces_in_place() {
        let (renderer, container) = setup();
        renderer
            .render(&h!("ul", NodeProps::new(), element("li"), "tail"), &container)
            .unwrap();
        renderer
            .render(&h!("ul", NodeProps::new(), element("p"), "tail"), &container)
            .unwrap();

        assert_eq!(html(&renderer, container), "<body><ul><p></p>tail</ul></body>");
    }

    #[test]
    fn shrinking_children_removes_trailing_nodes() {
        let (renderer, container) = setup();
        renderer
            .render(&h!("ul", NodeProps::new(), "a", "b", "c"), &container)
            .unwrap();
        renderer
            .render(&h!("ul", NodeProps::new(), "a"), &container)
            .unwrap();

        assert_eq!(html(&renderer, container), "<body><ul>a</ul></body>");
    }

    #[test]
    fn boolean_and_null_attributes() {
        let (renderer, container) = setup();
        renderer
            .render(
                &h!(
                    "input",
                    NodeProps::new()
                        .attr("disabled", true)
                        .attr("readonly", false)
                        .attr("placeholder", PropValue::Null)
                        .attr("size", 3)
                ),
                &container,
            )
            .unwrap();
        assert_eq!(
            html(&renderer, container),
            r#"<body><input disabled size="3"></input></body>"#
        );

        renderer
            .render(&h!("input", NodeProps::new().attr("disabled", false)), &container)
            .unwrap();
        assert_eq!(html(&renderer, container), "<body><input></input></body>");
    }

    #[test]
    fn style_merges_and_clears() {
        let (renderer, container) = setup();
        renderer
            .render(
                &h!("div", NodeProps::new().style("color", "red").style("margin", "0")),
                &container,
            )
            .unwrap();
        let div = renderer.root_node().unwrap();
        take_mutations(&renderer);

        renderer
            .render(
                &h!("div", NodeProps::new().style("color", "blue").style("margin", "0")),
                &container,
            )
            .unwrap();
        let mutations = take_mutations(&renderer);
        assert_eq!(mutations.len(), 1);
        renderer.with_host(|dom| assert_eq!(dom.style(div, "color"), Some("blue")));

        renderer.render(&element("div"), &container).unwrap();
        renderer.with_host(|dom| assert_eq!(dom.style(div, "color"), None));
    }

    #[test]
    fn listeners_are_swapped_without_duplicates() {
        let (renderer, container) = setup();
        let calls = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second"] {
            let calls = calls.clone();
            renderer
                .render(
                    &h!(
                        "button",
                        NodeProps::new().on("onClick", move |_| calls.borrow_mut().push(label))
                    ),
                    &container,
                )
                .unwrap();
        }

        let button = renderer.root_node().unwrap();
        renderer.with_host(|dom| assert_eq!(dom.listener_count(button, "click"), 1));
        assert_eq!(renderer.dispatch(&button, &Event::new("click")), 1);
        assert_eq!(*calls.borrow(), vec!["second"]);
    }

    #[test]
    fn drifted_node_is_appended_not_replaced() {
        let (renderer, container) = setup();
        renderer.render(&element("section"), &container).unwrap();
        let section = renderer.root_node().unwrap();

        // Someone else moved the node out from under the renderer.
        renderer.with_host(|dom| dom.remove_child(&container, &section));

        renderer.render(&text_node("fresh"), &container).unwrap();
        assert_eq!(html(&renderer, container), "<body>fresh</body>");
    }

    #[test]
    fn rendering_into_new_container_unmounts_old_root() {
        let (renderer, first) = setup();
        let second = renderer.with_host(|dom| dom.create_element("aside"));

        renderer.render(&text_node("x"), &first).unwrap();
        renderer.render(&text_node("y"), &second).unwrap();

        assert_eq!(html(&renderer, first), "<body></body>");
        assert_eq!(html(&renderer, second), "<aside>y</aside>");
    }

    #[test]
    fn unmount_root_empties_container() {
        let (renderer, container) = setup();
        renderer
            .render(&h!("div", NodeProps::new(), "bye"), &container)
            .unwrap();
        renderer.unmount_root();

        assert_eq!(html(&renderer, container), "<body></body>");
        assert!(renderer.root_node().is_none());
    }
}
