//! Component definitions.
//!
//! `component(options)` validates a `ComponentOptions`, erases its types into
//! an immutable `ComponentDef`, registers it by name, and returns a typed
//! `ComponentFactory` whose `node(props)` builds component VNodes.
//!
//! # Typestate
//!
//! Options start with a unit setup state. Calling `setup` switches the state
//! type to whatever `setup` returns, so `render` always sees the type that
//! `setup` actually produced. A component without `setup` renders from `&()`.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::lifecycle::{LifecycleHooks, LifecyclePhase};
use crate::error::{Error, RenderError, Result};
use crate::vdom::{ComponentBinding, NodeProps, VNode, VNodeKind};

thread_local! {
    static GLOBAL_REGISTRY: RefCell<ComponentRegistry> = RefCell::new(ComponentRegistry::new());
}

/// Unique identifier for a component definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Type-erased component props.
///
/// Implemented for every `PartialEq + 'static` type; equality across
/// different concrete types is always `false`.
pub trait ComponentProps: Any {
    fn props_eq(&self, other: &dyn ComponentProps) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: PartialEq + 'static> ComponentProps for T {
    fn props_eq(&self, other: &dyn ComponentProps) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

type SetupFn = Rc<dyn Fn(&dyn ComponentProps) -> Result<Rc<dyn Any>>>;
type RenderFn = Rc<dyn Fn(&dyn Any, &dyn ComponentProps) -> Result<VNode>>;
type TypedRender<P, S> = Rc<dyn Fn(&S, &P) -> std::result::Result<VNode, RenderError>>;

/// An immutable, type-erased component definition.
pub struct ComponentDef {
    id: ComponentId,
    name: String,
    setup: SetupFn,
    render: RenderFn,
    hooks: LifecycleHooks,
}

impl ComponentDef {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The option-level hooks every instance starts with.
    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub(crate) fn run_setup(&self, props: &dyn ComponentProps) -> Result<Rc<dyn Any>> {
        (self.setup)(props)
    }

    pub(crate) fn run_render(&self, state: &dyn Any, props: &dyn ComponentProps) -> Result<VNode> {
        (self.render)(state, props)
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Builder for a component definition.
///
/// # Example
///
/// ```rust
/// use bloxi_core::component::{component, ComponentOptions};
/// use bloxi_core::reactive::state;
/// use bloxi_core::vdom::NodeProps;
/// use bloxi_core::h;
///
/// #[derive(PartialEq)]
/// struct CounterProps {
///     label: String,
/// }
///
/// let counter = component(
///     ComponentOptions::new("Counter")
///         .setup(|_: &CounterProps| state(0))
///         .render(|count, props| {
///             h!("p", NodeProps::new(), props.label.as_str(), count.get())
///         }),
/// )
/// .unwrap();
///
/// let node = counter.node(CounterProps { label: "Clicks: ".into() });
/// assert!(node.is_component());
/// ```
pub struct ComponentOptions<P, S = ()> {
    name: String,
    setup: Rc<dyn Fn(&P) -> S>,
    render: Option<TypedRender<P, S>>,
    hooks: LifecycleHooks,
}

impl<P: 'static> ComponentOptions<P, ()> {
    /// Start a definition with the given registry name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: Rc::new(|_: &P| ()),
            render: None,
            hooks: LifecycleHooks::new(),
        }
    }

    /// Set the setup function. Its result is handed to every render.
    ///
    /// Call before `render`: a render registered earlier was written against
    /// the unit state and is discarded.
    pub fn setup<S, F>(self, setup: F) -> ComponentOptions<P, S>
    where
        S: 'static,
        F: Fn(&P) -> S + 'static,
    {
        if self.render.is_some() {
            tracing::warn!(
                component = %self.name,
                "setup set after render; the earlier render is dropped"
            );
        }
        ComponentOptions {
            name: self.name,
            setup: Rc::new(setup),
            render: None,
            hooks: self.hooks,
        }
    }
}

impl<P: 'static, S: 'static> ComponentOptions<P, S> {
    /// Set an infallible render function.
    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&S, &P) -> VNode + 'static,
    {
        self.render = Some(Rc::new(move |state: &S, props: &P| {
            Ok::<_, RenderError>(render(state, props))
        }));
        self
    }

    /// Set a render function that can fail.
    pub fn try_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&S, &P) -> std::result::Result<VNode, RenderError> + 'static,
    {
        self.render = Some(Rc::new(render));
        self
    }

    pub fn before_mount(self, hook: impl Fn() + 'static) -> Self {
        self.hook(LifecyclePhase::BeforeMount, hook)
    }

    pub fn mounted(self, hook: impl Fn() + 'static) -> Self {
        self.hook(LifecyclePhase::Mounted, hook)
    }

    pub fn before_update(self, hook: impl Fn() + 'static) -> Self {
        self.hook(LifecyclePhase::BeforeUpdate, hook)
    }

    pub fn updated(self, hook: impl Fn() + 'static) -> Self {
        self.hook(LifecyclePhase::Updated, hook)
    }

    pub fn before_unmount(self, hook: impl Fn() + 'static) -> Self {
        self.hook(LifecyclePhase::BeforeUnmount, hook)
    }

    pub fn unmounted(self, hook: impl Fn() + 'static) -> Self {
        self.hook(LifecyclePhase::Unmounted, hook)
    }

    fn hook(mut self, phase: LifecyclePhase, hook: impl Fn() + 'static) -> Self {
        self.hooks.push(phase, hook);
        self
    }
}

/// Typed handle to a registered definition.
pub struct ComponentFactory<P> {
    def: Rc<ComponentDef>,
    _props: PhantomData<fn(P)>,
}

impl<P: PartialEq + 'static> ComponentFactory<P> {
    /// Build a component node. Nothing is mounted until a renderer
    /// materializes the node.
    pub fn node(&self, props: P) -> VNode {
        self.node_with(props, NodeProps::default())
    }

    /// Build a component node carrying node-level props such as a key.
    pub fn node_with(&self, props: P, node_props: NodeProps) -> VNode {
        let binding = ComponentBinding {
            def: Rc::clone(&self.def),
            props: Rc::new(props),
        };
        VNode::from_parts(VNodeKind::Component(binding), node_props, Vec::new())
    }
}

impl<P> ComponentFactory<P> {
    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn definition(&self) -> &Rc<ComponentDef> {
        &self.def
    }
}

impl<P> Clone for ComponentFactory<P> {
    fn clone(&self) -> Self {
        Self {
            def: Rc::clone(&self.def),
            _props: PhantomData,
        }
    }
}

impl<P> fmt::Debug for ComponentFactory<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentFactory").field(&self.def.name()).finish()
    }
}

/// Define a component and register it in the thread's global registry.
///
/// Fails with `Error::MissingComponentName` for an empty name and
/// `Error::MissingRender` when no render function was given.
pub fn component<P, S>(options: ComponentOptions<P, S>) -> Result<ComponentFactory<P>>
where
    P: PartialEq + 'static,
    S: 'static,
{
    let ComponentOptions {
        name,
        setup,
        render,
        hooks,
    } = options;

    if name.is_empty() {
        return Err(Error::MissingComponentName);
    }
    let Some(render) = render else {
        return Err(Error::MissingRender { component: name });
    };

    let setup: SetupFn = {
        let name = name.clone();
        Rc::new(move |props: &dyn ComponentProps| {
            let props = props
                .as_any()
                .downcast_ref::<P>()
                .ok_or_else(|| Error::PropsMismatch {
                    component: name.clone(),
                })?;
            Ok(Rc::new(setup(props)) as Rc<dyn Any>)
        })
    };

    let render: RenderFn = {
        let name = name.clone();
        Rc::new(move |state: &dyn Any, props: &dyn ComponentProps| {
            let mismatch = || Error::PropsMismatch {
                component: name.clone(),
            };
            let state = state.downcast_ref::<S>().ok_or_else(mismatch)?;
            let props = props.as_any().downcast_ref::<P>().ok_or_else(mismatch)?;
            render(state, props).map_err(|source| Error::Render {
                component: name.clone(),
                source,
            })
        })
    };

    let def = Rc::new(ComponentDef {
        id: ComponentId::next(),
        name,
        setup,
        render,
        hooks,
    });

    ComponentRegistry::with_global(|registry| registry.register(Rc::clone(&def)));

    Ok(ComponentFactory {
        def,
        _props: PhantomData,
    })
}

/// Definitions by name.
#[derive(Default)]
pub struct ComponentRegistry {
    definitions: IndexMap<String, Rc<ComponentDef>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing and returning any previous one with
    /// the same name.
    pub fn register(&mut self, def: Rc<ComponentDef>) -> Option<Rc<ComponentDef>> {
        let previous = self.definitions.insert(def.name().to_owned(), def);
        if let Some(previous) = &previous {
            tracing::warn!(component = previous.name(), "component re-registered; replacing");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<Rc<ComponentDef>> {
        self.definitions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Access the registry `component(..)` registers into.
    pub fn with_global<R>(f: impl FnOnce(&mut ComponentRegistry) -> R) -> R {
        GLOBAL_REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdom::{element, text_node};

    #[derive(Debug, PartialEq)]
    struct Label(String);

    #[test]
    fn empty_name_is_rejected() {
        let result = component(ComponentOptions::<()>::new("").render(|_, _| element("div")));
        assert!(matches!(result, Err(Error::MissingComponentName)));
    }

    #[test]
    fn missing_render_is_rejected() {
        let result = component(ComponentOptions::<()>::new("Blank"));
        assert!(matches!(
            result,
            Err(Error::MissingRender { component }) if component == "Blank"
        ));
    }

    #[test]
    fn definition_is_registered_globally() {
        let factory = component(
            ComponentOptions::new("RegistryProbe").render(|_, label: &Label| text_node(&label.0)),
        )
        .unwrap();

        assert_eq!(factory.name(), "RegistryProbe");
        ComponentRegistry::with_global(|registry| {
            assert!(registry.contains("RegistryProbe"));
            let def = registry.get("RegistryProbe").unwrap();
            assert_eq!(def.id(), factory.definition().id());
        });
    }

    #[test]
    fn re_registering_replaces_definition() {
        let mut registry = ComponentRegistry::new();
        let first = component(ComponentOptions::<()>::new("Twice").render(|_, _| element("a")))
            .unwrap();
        let second = component(ComponentOptions::<()>::new("Twice").render(|_, _| element("b")))
            .unwrap();

        assert!(registry.register(Rc::clone(first.definition())).is_none());
        let replaced = registry.register(Rc::clone(second.definition())).unwrap();
        assert_eq!(replaced.id(), first.definition().id());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Twice"]);
    }

    #[test]
    fn node_carries_binding_without_mounting() {
        let factory = component(
            ComponentOptions::new("Greeter")
                .setup(|label: &Label| format!("Hello, {}", label.0))
                .render(|greeting, _| text_node(greeting.as_str())),
        )
        .unwrap();

        let node = factory.node(Label("Ada".into()));
        let binding = node.component().unwrap();
        assert_eq!(binding.name(), "Greeter");
        assert!(binding.props_eq(factory.node(Label("Ada".into())).component().unwrap()));
        assert!(!binding.props_eq(factory.node(Label("Bob".into())).component().unwrap()));
    }

    #[test]
    fn erased_setup_and_render_compose() {
        let factory = component(
            ComponentOptions::new("Doubler")
                .setup(|n: &i32| n * 2)
                .render(|doubled, n| text_node(format!("{n} -> {doubled}"))),
        )
        .unwrap();

        let def = factory.definition();
        let state = def.run_setup(&21).unwrap();
        let node = def.run_render(&*state, &21).unwrap();
        assert_eq!(node.text(), Some("21 -> 42"));
    }

    #[test]
    fn wrong_props_type_is_reported() {
        let factory = component(ComponentOptions::new("Typed").render(|_, n: &i32| text_node(n.to_string())))
            .unwrap();

        let result = factory.definition().run_render(&(), &"not a number");
        assert!(matches!(result, Err(Error::PropsMismatch { .. })));
    }

    #[test]
    fn render_failures_carry_component_name() {
        let factory = component(
            ComponentOptions::<()>::new("Broken").try_render(|_, _| Err(RenderError::msg("boom"))),
        )
        .unwrap();

        let err = factory.definition().run_render(&(), &()).unwrap_err();
        assert_eq!(err.to_string(), "error rendering component `Broken`: boom");
    }

    #[test]
    fn props_equality_is_structural_and_type_aware() {
        let a: Rc<dyn ComponentProps> = Rc::new(Label("x".into()));
        let b: Rc<dyn ComponentProps> = Rc::new(Label("x".into()));
        let c: Rc<dyn ComponentProps> = Rc::new(7_i32);
        assert!((*a).props_eq(&*b));
        assert!(!(*a).props_eq(&*c));
    }
}
