#![forbid(unsafe_code)]

//! Inherited broadcast node: one mounted provider and its dependents.
//!
//! The node owns the [`Lifecycle`] of its value and the set of elements that
//! registered through `watch` or `select`. When the value changes the node
//! marks dependents through the host [`Scheduler`]; it never rebuilds them
//! itself.
//!
//! A dependent is either interested in every change or
//! only in changes that flip one of its selector filters. A plain `watch`
//! always wins over selectors registered by the same element.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::rc::Rc;

use crate::access::SelectGuard;
use crate::context::{Context, ElementId};
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::provider::{Provider, ProviderStyle};

/// Decides from the new value whether a selecting dependent must rebuild.
pub(crate) type Filter<T> = Rc<dyn Fn(&T) -> bool>;

enum Dependency<T> {
    All,
    Selected(Vec<Filter<T>>),
}

/// Runtime state of a provider mounted in the tree.
pub struct InheritedNode<T> {
    context: Context,
    lifecycle: Lifecycle<T>,
    dependents: RefCell<BTreeMap<ElementId, Dependency<T>>>,
}

impl<T: Clone + 'static> InheritedNode<T> {
    /// Wrap `config` for the element behind `context`. The host attaches it.
    #[must_use]
    pub fn new(context: Context, config: Provider<T>) -> Self {
        Self {
            context,
            lifecycle: Lifecycle::new(config),
            dependents: RefCell::new(BTreeMap::new()),
        }
    }

    /// The provider element's own context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle<T> {
        &self.lifecycle
    }

    /// The value if already constructed, without constructing it.
    #[must_use]
    pub fn current_value(&self) -> Option<T> {
        self.lifecycle.peek()
    }

    /// The value, constructing it on first call.
    pub fn obtain(&self) -> Result<T> {
        self.lifecycle.obtain(&self.context)
    }

    pub fn attach(&self) -> Result<()> {
        self.lifecycle.attach(&self.context)
    }

    /// Remove the node for good. Dependents are forgotten, not notified.
    pub fn detach(&self) -> Result<()> {
        self.dependents.borrow_mut().clear();
        self.lifecycle.detach(&self.context)
    }

    /// Apply a rebuilt configuration, notifying dependents when it asks to.
    pub fn update(&self, next: Provider<T>) -> Result<bool> {
        let notify = self.lifecycle.update(&self.context, next)?;
        if notify {
            self.notify_dependents();
        }
        Ok(notify)
    }

    /// Re-derive the value after a provider this one watches changed.
    pub fn refresh_from_dependencies(&self) -> Result<bool> {
        let notify = self.lifecycle.refresh_from_dependencies(&self.context)?;
        if notify {
            self.notify_dependents();
        }
        Ok(notify)
    }

    /// Mark dependents whose interest matches the current value. Returns how
    /// many were marked.
    pub fn notify_dependents(&self) -> usize {
        let snapshot: Vec<(ElementId, Option<Vec<Filter<T>>>)> = self
            .dependents
            .borrow()
            .iter()
            .map(|(id, dependency)| match dependency {
                Dependency::All => (*id, None),
                Dependency::Selected(filters) => (*id, Some(filters.clone())),
            })
            .collect();
        if snapshot.is_empty() {
            return 0;
        }

        let scheduler = Rc::clone(self.context.scheduler());
        let value = self.current_value();
        let mut marked = 0;
        for (id, filters) in snapshot {
            let rebuild = match (filters, &value) {
                (None, _) | (Some(_), None) => true,
                (Some(_), Some(_)) if scheduler.is_dirty(id) => true,
                (Some(filters), Some(value)) => {
                    let _guard = SelectGuard::enter();
                    filters.iter().any(|filter| filter(value))
                }
            };
            if rebuild {
                scheduler.mark_needs_build(id);
                marked += 1;
            }
        }
        tracing::debug!(
            message = "provider.notify",
            type_name = type_name::<T>(),
            element = self.context.element().get(),
            dependents = marked
        );
        marked
    }

    /// Register `element`. `None` asks for every change; `Some` adds a
    /// selector filter unless the element already listens to everything.
    pub(crate) fn add_dependent(&self, element: ElementId, filter: Option<Filter<T>>) {
        let mut dependents = self.dependents.borrow_mut();
        match (dependents.entry(element), filter) {
            (Entry::Vacant(slot), None) => {
                slot.insert(Dependency::All);
            }
            (Entry::Vacant(slot), Some(filter)) => {
                slot.insert(Dependency::Selected(vec![filter]));
            }
            (Entry::Occupied(mut slot), None) => {
                slot.insert(Dependency::All);
            }
            (Entry::Occupied(mut slot), Some(filter)) => {
                if let Dependency::Selected(filters) = slot.get_mut() {
                    filters.push(filter);
                }
            }
        }
    }

    #[must_use]
    pub fn is_dependent(&self, element: ElementId) -> bool {
        self.dependents.borrow().contains_key(&element)
    }
}

impl<T> fmt::Debug for InheritedNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InheritedNode")
            .field("type", &type_name::<T>())
            .field("element", &self.context.element())
            .field("dependents", &self.dependents.borrow().len())
            .finish_non_exhaustive()
    }
}

// ─── Erased node ─────────────────────────────────────────────────────────────

/// Type-erased view of an [`InheritedNode`], as stored in scopes and
/// dependency lists.
pub trait AnyInherited {
    /// The provider element.
    fn element(&self) -> ElementId;
    fn key(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
    fn style(&self) -> ProviderStyle;
    fn is_computed(&self) -> bool;

    fn attach(&self) -> Result<()>;
    fn detach(&self) -> Result<()>;
    fn refresh_from_dependencies(&self) -> Result<bool>;
    fn notify_dependents(&self) -> usize;

    fn remove_dependent(&self, element: ElementId);
    /// Drop the selector filters of `element`; `watch` registrations stay.
    fn clear_selectors(&self, element: ElementId);
    fn dependent_count(&self) -> usize;

    fn as_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Clone + 'static> AnyInherited for InheritedNode<T> {
    fn element(&self) -> ElementId {
        self.context.element()
    }

    fn key(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn style(&self) -> ProviderStyle {
        self.lifecycle.style()
    }

    fn is_computed(&self) -> bool {
        self.lifecycle.is_computed()
    }

    fn attach(&self) -> Result<()> {
        InheritedNode::attach(self)
    }

    fn detach(&self) -> Result<()> {
        InheritedNode::detach(self)
    }

    fn refresh_from_dependencies(&self) -> Result<bool> {
        InheritedNode::refresh_from_dependencies(self)
    }

    fn notify_dependents(&self) -> usize {
        InheritedNode::notify_dependents(self)
    }

    fn remove_dependent(&self, element: ElementId) {
        self.dependents.borrow_mut().remove(&element);
    }

    fn clear_selectors(&self, element: ElementId) {
        let mut dependents = self.dependents.borrow_mut();
        if matches!(dependents.get(&element), Some(Dependency::Selected(_))) {
            dependents.remove(&element);
        }
    }

    fn dependent_count(&self) -> usize {
        self.dependents.borrow().len()
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl fmt::Debug for dyn AnyInherited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyInherited")
            .field("type", &self.type_name())
            .field("element", &self.element())
            .finish()
    }
}
