#![forbid(unsafe_code)]

//! Test doubles for hosts and unit tests.
//!
//! Enabled for this crate's own tests and, for downstream crates, through the
//! `test-helpers` feature.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::context::{Context, ElementId, Scheduler};
use crate::node::InheritedNode;
use crate::provider::Provider;
use crate::scope::Scope;

/// Scheduler that records every rebuild request.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    marks: RefCell<Vec<ElementId>>,
}

impl RecordingScheduler {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Every request so far, in order, duplicates included.
    #[must_use]
    pub fn marks(&self) -> Vec<ElementId> {
        self.marks.borrow().clone()
    }

    #[must_use]
    pub fn marks_for(&self, element: ElementId) -> usize {
        self.marks
            .borrow()
            .iter()
            .filter(|marked| **marked == element)
            .count()
    }

    /// Distinct marked elements, clearing the record.
    pub fn take_dirty(&self) -> Vec<ElementId> {
        let mut marks = std::mem::take(&mut *self.marks.borrow_mut());
        marks.sort_unstable();
        marks.dedup();
        marks
    }

    pub fn clear(&self) {
        self.marks.borrow_mut().clear();
    }
}

impl Scheduler for RecordingScheduler {
    fn mark_needs_build(&self, element: ElementId) {
        self.marks.borrow_mut().push(element);
    }

    fn is_dirty(&self, element: ElementId) -> bool {
        self.marks.borrow().contains(&element)
    }
}

/// Shared call counter for factories, teardowns and projectors.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Rc<Cell<u32>>);

impl CallCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.set(self.0.get() + 1);
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.0.get()
    }
}

/// Mount and attach `provider` as a fresh element below `scope`.
///
/// Returns the node and the scope its children see.
///
/// # Panics
///
/// Panics if attaching fails, e.g. when an eager factory reads a missing
/// provider.
pub fn mount_provider<T: Clone + 'static>(
    scope: &Scope,
    scheduler: &Rc<RecordingScheduler>,
    provider: Provider<T>,
) -> (Rc<InheritedNode<T>>, Scope) {
    let cx = Context::new(ElementId::next(), scope.clone(), scheduler.clone());
    let node = Rc::new(InheritedNode::new(cx, provider));
    if let Err(err) = node.attach() {
        panic!("attaching Provider<{}> failed: {err}", std::any::type_name::<T>());
    }
    let child_scope = scope.provide(node.clone());
    (node, child_scope)
}
