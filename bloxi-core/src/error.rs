//! Error types for the Bloxi core.
//!
//! Failures fall into three classes:
//!
//! - Definition-time errors (`MissingComponentName`, `MissingRender`) are
//!   returned from `component(...)` and stop the definition.
//! - Render errors are logged with the component's name and then propagated
//!   to whoever drove the render (mount, flush, or `Runtime::tick`).
//! - Lifecycle misuse and shadow/host drift are only logged; they never
//!   surface as an `Error`.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the component model and renderer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `component(...)` was called with an empty name.
    #[error("component must have a name")]
    MissingComponentName,

    /// A component was defined without a `render` function.
    #[error("component `{component}` has no render function")]
    MissingRender { component: String },

    /// The component's `render` failed.
    #[error("error rendering component `{component}`: {source}")]
    Render {
        component: String,
        #[source]
        source: RenderError,
    },

    /// Type-erased props of the wrong type reached a component definition.
    #[error("component `{component}` received props of an unexpected type")]
    PropsMismatch { component: String },
}

/// The error a component's render function reports.
///
/// Wraps either a plain message or an arbitrary source error.
pub struct RenderError {
    inner: Box<dyn std::error::Error + 'static>,
}

impl RenderError {
    /// Create a render error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            inner: message.into(),
        }
    }

    /// Wrap any error type.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            inner: Box::new(error),
        }
    }
}

impl fmt::Debug for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}
