#![forbid(unsafe_code)]

//! Per-element build context and the host scheduling contract.
//!
//! A [`Context`] is created by the host for every element it mounts. It
//! carries the element's [`ElementId`], the [`Scope`] of providers visible
//! from that position, the host [`Scheduler`], and the list of providers the
//! element currently depends on. Cloning a `Context` yields a handle to the
//! **same** element.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::node::AnyInherited;
use crate::scope::Scope;

// ─── Element IDs ─────────────────────────────────────────────────────────────

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a host element (a tree position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// Allocate a fresh, process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element #{}", self.0)
    }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Rebuild scheduling, provided by the host tree.
///
/// `mark_needs_build` must only record the request; the host rebuilds marked
/// elements later in the same pass, never synchronously from inside the call.
pub trait Scheduler {
    fn mark_needs_build(&self, element: ElementId);

    /// Whether `element` is already scheduled. Lets nodes skip selector
    /// evaluation for dependents that will rebuild anyway.
    fn is_dirty(&self, element: ElementId) -> bool {
        let _ = element;
        false
    }
}

// ─── Context ─────────────────────────────────────────────────────────────────

struct ContextInner {
    element: ElementId,
    scope: RefCell<Scope>,
    scheduler: Rc<dyn Scheduler>,
    /// Providers this element registered with through `watch`/`select`.
    dependencies: RefCell<Vec<Rc<dyn AnyInherited>>>,
}

/// Handle to one host element, passed to builders, factories and teardowns.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    #[must_use]
    pub fn new(element: ElementId, scope: Scope, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                element,
                scope: RefCell::new(scope),
                scheduler,
                dependencies: RefCell::new(Vec::new()),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.inner.element
    }

    /// Providers visible from this element.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.inner.scope.borrow().clone()
    }

    /// Replace the visible providers after the host relocated the element.
    ///
    /// Existing registrations are kept; call [`reset_dependencies`] as well
    /// when the element should re-resolve its providers.
    ///
    /// [`reset_dependencies`]: Context::reset_dependencies
    pub fn set_scope(&self, scope: Scope) {
        *self.inner.scope.borrow_mut() = scope;
    }

    #[must_use]
    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.inner.scheduler
    }

    /// Called by the host right before the element rebuilds.
    ///
    /// Selector filters registered during the previous build are dropped so
    /// that the new build registers fresh ones. Plain `watch` registrations
    /// survive.
    pub fn begin_build(&self) {
        let element = self.element();
        for node in self.dependencies() {
            node.clear_selectors(element);
        }
    }

    /// Drop every registration this element holds.
    pub fn reset_dependencies(&self) {
        let element = self.element();
        let nodes = std::mem::take(&mut *self.inner.dependencies.borrow_mut());
        for node in nodes {
            node.remove_dependent(element);
        }
    }

    /// Called by the host when the element leaves the tree for good.
    pub fn unmount(&self) {
        self.reset_dependencies();
    }

    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Whether both handles refer to the same element.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn depend_on(&self, node: Rc<dyn AnyInherited>) {
        let mut dependencies = self.inner.dependencies.borrow_mut();
        if !dependencies
            .iter()
            .any(|existing| existing.element() == node.element())
        {
            dependencies.push(node);
        }
    }

    fn dependencies(&self) -> Vec<Rc<dyn AnyInherited>> {
        self.inner.dependencies.borrow().clone()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("element", &self.inner.element)
            .field("scope", &*self.inner.scope.borrow())
            .field("dependencies", &self.dependency_count())
            .finish_non_exhaustive()
    }
}
