#![forbid(unsafe_code)]

//! Immutable widget descriptions consumed by [`Tree`](crate::Tree).

use std::fmt;
use std::rc::Rc;

use lineage_core::{AnyProvider, Context, Provider, Result};

/// Identity of a widget across rebuilds.
///
/// Local keys match siblings under the same parent. Global keys match
/// anywhere in the tree, so the element moves with its widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Local(String),
    Global(u64),
}

impl Key {
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    #[must_use]
    pub const fn global(id: u64) -> Self {
        Self::Global(id)
    }
}

pub type BuildFn = Rc<dyn Fn(&Context) -> Result<Widget>>;

#[derive(Clone)]
pub enum Widget {
    Empty {
        key: Option<Key>,
    },
    /// Exposes a provider to `child` and everything below it.
    Provider {
        key: Option<Key>,
        provider: Rc<dyn AnyProvider>,
        child: Rc<Widget>,
    },
    /// Builds its child from the providers above it.
    Builder {
        key: Option<Key>,
        build: BuildFn,
    },
    Column {
        key: Option<Key>,
        children: Rc<[Widget]>,
    },
}

impl Widget {
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty { key: None }
    }

    #[must_use]
    pub fn provider<T: Clone + 'static>(provider: Provider<T>, child: Widget) -> Self {
        Self::provider_any(provider.into_any(), child)
    }

    #[must_use]
    pub fn provider_any(provider: Rc<dyn AnyProvider>, child: Widget) -> Self {
        Self::Provider {
            key: None,
            provider,
            child: Rc::new(child),
        }
    }

    #[must_use]
    pub fn builder(build: impl Fn(&Context) -> Result<Widget> + 'static) -> Self {
        Self::Builder {
            key: None,
            build: Rc::new(build),
        }
    }

    #[must_use]
    pub fn column(children: impl IntoIterator<Item = Widget>) -> Self {
        Self::Column {
            key: None,
            children: children.into_iter().collect(),
        }
    }

    /// Attach `key` to this widget.
    #[must_use]
    pub fn keyed(mut self, key: Key) -> Self {
        match &mut self {
            Self::Empty { key: slot }
            | Self::Provider { key: slot, .. }
            | Self::Builder { key: slot, .. }
            | Self::Column { key: slot, .. } => *slot = Some(key),
        }
        self
    }

    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        match self {
            Self::Empty { key }
            | Self::Provider { key, .. }
            | Self::Builder { key, .. }
            | Self::Column { key, .. } => key.as_ref(),
        }
    }

    /// Whether an element built from `self` can take `next` in place.
    #[must_use]
    pub fn can_update(&self, next: &Widget) -> bool {
        if self.key() != next.key() {
            return false;
        }
        match (self, next) {
            (Self::Empty { .. }, Self::Empty { .. })
            | (Self::Builder { .. }, Self::Builder { .. })
            | (Self::Column { .. }, Self::Column { .. }) => true,
            (Self::Provider { provider: a, .. }, Self::Provider { provider: b, .. }) => {
                a.key() == b.key() && a.style() == b.style()
            }
            _ => false,
        }
    }

    /// Whether both describe the very same configuration, so an element
    /// holding `self` has nothing to rebuild when handed `other`.
    #[must_use]
    pub fn same_instance(&self, other: &Widget) -> bool {
        match (self, other) {
            (Self::Empty { key: a }, Self::Empty { key: b }) => a == b,
            (
                Self::Provider {
                    provider: a,
                    child: ca,
                    ..
                },
                Self::Provider {
                    provider: b,
                    child: cb,
                    ..
                },
            ) => Rc::ptr_eq(a, b) && Rc::ptr_eq(ca, cb),
            (Self::Builder { build: a, .. }, Self::Builder { build: b, .. }) => Rc::ptr_eq(a, b),
            (Self::Column { children: a, .. }, Self::Column { children: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Empty { .. } => "Empty",
            Self::Provider { .. } => "Provider",
            Self::Builder { .. } => "Builder",
            Self::Column { .. } => "Column",
        }
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.kind());
        if let Some(key) = self.key() {
            s.field("key", key);
        }
        match self {
            Self::Provider {
                provider, child, ..
            } => {
                s.field("type", &provider.type_name());
                s.field("child", child);
            }
            Self::Column { children, .. } => {
                s.field("children", &children.len());
            }
            Self::Empty { .. } | Self::Builder { .. } => {}
        }
        s.finish()
    }
}
