//! Shadow tree records kept by the renderer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::ComponentInstance;
use crate::vdom::VNode;

pub(crate) type DomRef<N> = Rc<RefCell<DomInstance<N>>>;

/// One materialized node: the VNode last committed here and what it produced.
pub(crate) struct DomInstance<N> {
    pub(crate) vnode: VNode,
    /// `None` for component records, which borrow their child's node.
    pub(crate) node: Option<N>,
    pub(crate) instance: Option<ComponentInstance>,
    /// The host node this record's node is attached under.
    pub(crate) parent: N,
    pub(crate) children: Vec<DomRef<N>>,
}

impl<N: Clone> DomInstance<N> {
    pub(crate) fn host(vnode: VNode, node: N, parent: N, children: Vec<DomRef<N>>) -> DomRef<N> {
        Rc::new(RefCell::new(Self {
            vnode,
            node: Some(node),
            instance: None,
            parent,
            children,
        }))
    }

    pub(crate) fn component(
        vnode: VNode,
        instance: ComponentInstance,
        parent: N,
        child: DomRef<N>,
    ) -> DomRef<N> {
        Rc::new(RefCell::new(Self {
            vnode,
            node: None,
            instance: Some(instance),
            parent,
            children: vec![child],
        }))
    }

    /// The host node standing for this record in its parent.
    pub(crate) fn dom_node(&self) -> Option<N> {
        match &self.node {
            Some(node) => Some(node.clone()),
            None => self.children.first()?.borrow().dom_node(),
        }
    }
}
