#![forbid(unsafe_code)]

//! Provider configuration: what a host element declares.
//!
//! A [`Provider<T>`] is an immutable description, rebuilt freely by the host.
//! The runtime state lives in the [`InheritedNode`] the host mounts from it.
//!
//! Two styles exist and never convert into each other:
//!
//! - **Create** ([`Provider::new`]): the node owns its value. The factory runs
//!   lazily (or at attach with `lazy(false)`), the teardown runs on removal,
//!   and rebuilding with a new configuration keeps the constructed value.
//!   A factory that fails stores nothing; the error reaches the reader (or the
//!   host, for eager providers) and the next access runs the factory again.
//! - **Value** ([`Provider::value`]): the node exposes an externally owned
//!   value. Rebuilding swaps the value and `update_should_notify` decides
//!   whether dependents rebuild. No teardown.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{InvalidState, ProviderError, Result};
use crate::misuse;
use crate::node::{AnyInherited, InheritedNode};

pub(crate) type Factory<T> = Rc<dyn Fn(&Context) -> Result<T>>;
pub(crate) type Refresh<T> = Rc<dyn Fn(&Context, T) -> Result<T>>;
pub(crate) type Teardown<T> = Rc<dyn Fn(&Context, T)>;
pub(crate) type Predicate<T> = Rc<dyn Fn(&T, &T) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderStyle {
    Create,
    Value,
}

pub(crate) enum Source<T> {
    Create {
        factory: Factory<T>,
        refresh: Option<Refresh<T>>,
        teardown: Option<Teardown<T>>,
        lazy: bool,
    },
    Value(T),
}

/// Declares a value for the subtree below it.
pub struct Provider<T> {
    pub(crate) source: Source<T>,
    pub(crate) update_should_notify: Option<Predicate<T>>,
}

impl<T: Clone + 'static> Provider<T> {
    /// A lazily created, owned value.
    ///
    /// `factory` receives the provider's own context, so it resolves other
    /// providers from the provider's position (a provider of `T` may read the
    /// enclosing `T`). Lookup errors inside it propagate with `?`.
    #[must_use]
    pub fn new(factory: impl Fn(&Context) -> Result<T> + 'static) -> Self {
        Self {
            source: Source::Create {
                factory: Rc::new(factory),
                refresh: None,
                teardown: None,
                lazy: true,
            },
            update_should_notify: None,
        }
    }

    /// Expose an externally owned value; dependents are notified when a
    /// rebuild brings a value that is not `==` to the previous one.
    #[must_use]
    pub fn value(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::value_with(value, |previous, next| previous != next)
    }

    /// Expose an externally owned value with a custom update predicate.
    #[must_use]
    pub fn value_with(value: T, update_should_notify: impl Fn(&T, &T) -> bool + 'static) -> Self {
        misuse::check_value_type::<T>();
        Self {
            source: Source::Value(value),
            update_should_notify: Some(Rc::new(update_should_notify)),
        }
    }

    /// Construct at attach time instead of on first access.
    ///
    /// Has no effect on value providers.
    #[must_use]
    pub fn lazy(mut self, lazy: bool) -> Self {
        if let Source::Create { lazy: current, .. } = &mut self.source {
            *current = lazy;
        }
        self
    }

    /// Release the constructed value when the provider leaves the tree.
    ///
    /// Not called when the value was never constructed. Has no effect on value
    /// providers, which do not own their value.
    #[must_use]
    pub fn dispose(mut self, teardown: impl Fn(&Context, T) + 'static) -> Self {
        if let Source::Create { teardown: current, .. } = &mut self.source {
            *current = Some(Rc::new(teardown));
        }
        self
    }

    /// Re-derive the constructed value whenever the provider rebuilds from
    /// outside (new configuration, or a provider it watches changed).
    ///
    /// Runs once right after the factory. Dependents are notified when the
    /// result differs from the previous value, unless
    /// [`update_should_notify`](Provider::update_should_notify) says otherwise.
    /// A failing refresh keeps the previous value. Has no effect on value
    /// providers.
    #[must_use]
    pub fn refresh(mut self, refresh: impl Fn(&Context, T) -> Result<T> + 'static) -> Self
    where
        T: PartialEq,
    {
        if let Source::Create { refresh: current, .. } = &mut self.source {
            *current = Some(Rc::new(refresh));
            if self.update_should_notify.is_none() {
                self.update_should_notify = Some(Rc::new(|previous: &T, next: &T| previous != next));
            }
        }
        self
    }

    /// Decide whether a swapped or re-derived value notifies dependents.
    #[must_use]
    pub fn update_should_notify(mut self, predicate: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.update_should_notify = Some(Rc::new(predicate));
        self
    }

    #[must_use]
    pub fn style(&self) -> ProviderStyle {
        match self.source {
            Source::Create { .. } => ProviderStyle::Create,
            Source::Value(_) => ProviderStyle::Value,
        }
    }

    /// Whether construction waits for the first access.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self.source, Source::Create { lazy: true, .. })
    }

    /// Erase the value type for hosts.
    #[must_use]
    pub fn into_any(self) -> Rc<dyn AnyProvider> {
        Rc::new(self)
    }

    pub(crate) fn predicate(&self) -> Option<Predicate<T>> {
        self.update_should_notify.clone()
    }
}

impl<T: Clone> Clone for Provider<T> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            Source::Create {
                factory,
                refresh,
                teardown,
                lazy,
            } => Source::Create {
                factory: Rc::clone(factory),
                refresh: refresh.clone(),
                teardown: teardown.clone(),
                lazy: *lazy,
            },
            Source::Value(value) => Source::Value(value.clone()),
        };
        Self {
            source,
            update_should_notify: self.update_should_notify.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Provider");
        s.field("type", &std::any::type_name::<T>());
        match &self.source {
            Source::Create {
                refresh,
                teardown,
                lazy,
                ..
            } => {
                s.field("lazy", lazy);
                s.field("refresh", &refresh.is_some());
                s.field("dispose", &teardown.is_some());
            }
            Source::Value(value) => {
                s.field("value", value);
            }
        }
        s.finish_non_exhaustive()
    }
}

// ─── Erased provider ─────────────────────────────────────────────────────────

/// Type-erased provider configuration, as handled by host trees.
pub trait AnyProvider {
    /// Lookup key: the `TypeId` of the provided type.
    fn key(&self) -> TypeId;

    fn type_name(&self) -> &'static str;

    fn style(&self) -> ProviderStyle;

    /// Create the runtime node for an element. The host attaches it.
    fn mount(&self, cx: Context) -> Rc<dyn AnyInherited>;

    /// Whether `node` can take this configuration in place. When `false` the
    /// host must detach the node and mount a new one.
    fn can_update(&self, node: &dyn AnyInherited) -> bool {
        node.key() == self.key() && node.style() == self.style()
    }

    /// Apply this configuration to a node mounted from a compatible one.
    /// Returns whether dependents were notified.
    fn update(&self, node: &Rc<dyn AnyInherited>) -> Result<bool>;
}

impl<T: Clone + 'static> AnyProvider for Provider<T> {
    fn key(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn style(&self) -> ProviderStyle {
        Provider::style(self)
    }

    fn mount(&self, cx: Context) -> Rc<dyn AnyInherited> {
        Rc::new(InheritedNode::new(cx, self.clone()))
    }

    fn update(&self, node: &Rc<dyn AnyInherited>) -> Result<bool> {
        let node = Rc::clone(node)
            .as_any()
            .downcast::<InheritedNode<T>>()
            .map_err(|_| ProviderError::invalid_state::<T>(InvalidState::IncompatibleUpdate))?;
        node.update(self.clone())
    }
}
