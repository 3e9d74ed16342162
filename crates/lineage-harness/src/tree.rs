#![forbid(unsafe_code)]

//! Reference host tree.
//!
//! [`Tree`] turns [`Widget`] descriptions into elements, mounts and attaches
//! provider nodes, rebuilds elements marked dirty by provider notifications,
//! and detaches nodes when their element leaves the tree.
//!
//! # Reconciliation
//!
//! - An element takes a new widget in place when both have the same kind and
//!   key, and for providers the same provided type and style. Otherwise the
//!   old element is deactivated and a new one is mounted.
//! - Siblings match by local key first, then positionally.
//! - A widget with a global key reclaims the element that carried the key
//!   last, wherever it was. The element keeps its provider node; its subtree
//!   gets the new ancestor scope, drops its registrations and rebuilds.
//! - A global key may appear at most once per pass; a second claim fails
//!   with `InvalidState::DuplicateGlobalKey`.
//! - Deactivated elements are unmounted at the end of the pass, children
//!   before parents, unless a global key reclaimed them first.
//!
//! # Scheduling
//!
//! Provider notifications only mark elements dirty. [`Tree::pump`] rebuilds
//! the shallowest dirty element first, so an ancestor rebuild that reaches a
//! dirty descendant rebuilds it once.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use lineage_core::{
    AnyInherited, Context, ElementId, InheritedNode, InvalidState, ProviderError, Result, Scheduler,
    Scope,
};

use crate::widget::{Key, Widget};

// ─── Dirty set ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct DirtySet {
    ids: RefCell<BTreeSet<ElementId>>,
}

impl DirtySet {
    fn take(&self, element: ElementId) -> bool {
        self.ids.borrow_mut().remove(&element)
    }

    fn snapshot(&self) -> Vec<ElementId> {
        self.ids.borrow().iter().copied().collect()
    }
}

impl Scheduler for DirtySet {
    fn mark_needs_build(&self, element: ElementId) {
        self.ids.borrow_mut().insert(element);
    }

    fn is_dirty(&self, element: ElementId) -> bool {
        self.ids.borrow().contains(&element)
    }
}

// ─── Elements ────────────────────────────────────────────────────────────────

struct Element {
    widget: Widget,
    context: Context,
    parent: Option<ElementId>,
    depth: usize,
    children: Vec<ElementId>,
    node: Option<Rc<dyn AnyInherited>>,
    active: bool,
}

impl Element {
    /// Scope handed to the children of this element.
    fn child_scope(&self) -> Scope {
        let scope = self.context.scope();
        match &self.node {
            Some(node) => scope.provide(Rc::clone(node)),
            None => scope,
        }
    }
}

/// Counters over the lifetime of a [`Tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub mounted: u64,
    pub unmounted: u64,
    /// Elements rebuilt, from a parent update or from being dirty.
    pub rebuilt: u64,
    /// Elements reclaimed through a global key.
    pub relocated: u64,
}

/// Element tree driving provider lifecycles.
#[derive(Default)]
pub struct Tree {
    elements: HashMap<ElementId, Element>,
    root: Option<ElementId>,
    dirty: Rc<DirtySet>,
    global_keys: HashMap<u64, ElementId>,
    /// Global keys placed during the current reconciliation.
    claimed: HashSet<u64>,
    inactive: Vec<ElementId>,
    stats: TreeStats,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `widget` as the root, or update the current root with it, then
    /// pump.
    pub fn set_root(&mut self, widget: Widget) -> Result<()> {
        self.claimed.clear();
        let outcome = self
            .update_child(None, self.root, &widget, Scope::root(), 0)
            .map(|root| self.root = Some(root));
        match outcome {
            Ok(()) => self.pump().map(|_| ()),
            Err(err) => {
                self.finalize()?;
                Err(err)
            }
        }
    }

    /// Rebuild every dirty element, then unmount what was deactivated.
    /// Returns the number of dirty elements rebuilt.
    pub fn pump(&mut self) -> Result<usize> {
        let span = tracing::debug_span!("tree.pump", rebuilt = tracing::field::Empty);
        let _entered = span.enter();

        let mut rebuilt = 0;
        let mut outcome = Ok(());
        while let Some(element) = self.next_dirty() {
            self.claimed.clear();
            if let Err(err) = self.rebuild(element) {
                outcome = Err(err);
                break;
            }
            rebuilt += 1;
        }
        let finalized = self.finalize();
        span.record("rebuilt", rebuilt);
        outcome?;
        finalized?;
        Ok(rebuilt)
    }

    /// Unmount everything.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(root) = self.root.take() {
            self.deactivate(root);
        }
        self.finalize()
    }

    #[must_use]
    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    /// Number of mounted elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Context of the active element whose widget carries `key`.
    #[must_use]
    pub fn context_of(&self, key: &Key) -> Option<Context> {
        self.find(key).map(|element| element.context.clone())
    }

    /// Provider node of the active element whose widget carries `key`.
    #[must_use]
    pub fn node_of<T: Clone + 'static>(&self, key: &Key) -> Option<Rc<InheritedNode<T>>> {
        let node = Rc::clone(self.find(key)?.node.as_ref()?);
        node.as_any().downcast::<InheritedNode<T>>().ok()
    }

    fn find(&self, key: &Key) -> Option<&Element> {
        self.elements
            .values()
            .find(|element| element.active && element.widget.key() == Some(key))
    }

    fn owned_by(&self, element: ElementId, parent: Option<ElementId>) -> bool {
        self.elements
            .get(&element)
            .is_some_and(|element| element.parent == parent)
    }

    fn next_dirty(&self) -> Option<ElementId> {
        let mut best: Option<(usize, ElementId)> = None;
        for id in self.dirty.snapshot() {
            match self.elements.get(&id) {
                Some(element) if element.active => {
                    if best.is_none_or(|(depth, _)| element.depth < depth) {
                        best = Some((element.depth, id));
                    }
                }
                _ => {
                    self.dirty.take(id);
                }
            }
        }
        best.map(|(_, id)| id)
    }

    // ─── Reconciliation ──────────────────────────────────────────────────────

    fn update_child(
        &mut self,
        parent: Option<ElementId>,
        existing: Option<ElementId>,
        widget: &Widget,
        scope: Scope,
        depth: usize,
    ) -> Result<ElementId> {
        self.claim(widget)?;
        if let Some(old) = existing.filter(|old| self.owned_by(*old, parent)) {
            let compatible = self
                .elements
                .get(&old)
                .is_some_and(|element| element.widget.can_update(widget));
            if compatible {
                self.update(old, widget, scope)?;
                return Ok(old);
            }
            self.deactivate(old);
        }
        self.inflate(parent, widget, scope, depth)
    }

    fn update_children(
        &mut self,
        parent: ElementId,
        old: Vec<ElementId>,
        widgets: &[Widget],
        scope: &Scope,
        depth: usize,
    ) -> Result<Vec<ElementId>> {
        let candidates: HashSet<ElementId> = old.iter().copied().collect();
        let mut keyed: HashMap<Key, ElementId> = HashMap::new();
        let mut unkeyed: VecDeque<ElementId> = VecDeque::new();
        for id in old {
            if !self.owned_by(id, Some(parent)) {
                continue;
            }
            match self.elements.get(&id).and_then(|element| element.widget.key()) {
                Some(key) => {
                    keyed.insert(key.clone(), id);
                }
                None => unkeyed.push_back(id),
            }
        }

        let mut children = Vec::with_capacity(widgets.len());
        for widget in widgets {
            let candidate = match widget.key() {
                Some(key) => keyed.remove(key),
                None => unkeyed.pop_front(),
            };
            match self.update_child(Some(parent), candidate, widget, scope.clone(), depth) {
                Ok(id) => children.push(id),
                Err(err) => {
                    // Elements placed so far are not recorded as children yet.
                    for id in children {
                        if candidates.contains(&id) {
                            continue;
                        }
                        self.forget_child(id);
                        self.deactivate(id);
                    }
                    return Err(err);
                }
            }
        }

        for id in keyed.into_values().chain(unkeyed) {
            if self.owned_by(id, Some(parent)) {
                self.deactivate(id);
            }
        }
        Ok(children)
    }

    fn claim(&mut self, widget: &Widget) -> Result<()> {
        let Some(Key::Global(global)) = widget.key() else {
            return Ok(());
        };
        if self.claimed.insert(*global) {
            return Ok(());
        }
        let type_name = match widget {
            Widget::Provider { provider, .. } => provider.type_name(),
            _ => widget.kind(),
        };
        Err(ProviderError::InvalidState {
            type_name,
            reason: InvalidState::DuplicateGlobalKey,
        })
    }

    fn inflate(
        &mut self,
        parent: Option<ElementId>,
        widget: &Widget,
        scope: Scope,
        depth: usize,
    ) -> Result<ElementId> {
        if let Some(Key::Global(global)) = widget.key()
            && let Some(&id) = self.global_keys.get(global)
        {
            let compatible = self
                .elements
                .get(&id)
                .is_some_and(|element| element.widget.can_update(widget));
            if compatible {
                self.retake(id, parent, depth, scope.clone());
                self.update(id, widget, scope)?;
                return Ok(id);
            }
            self.global_keys.remove(global);
            self.forget_child(id);
            self.deactivate(id);
        }
        self.mount(parent, widget, scope, depth)
    }

    fn mount(
        &mut self,
        parent: Option<ElementId>,
        widget: &Widget,
        scope: Scope,
        depth: usize,
    ) -> Result<ElementId> {
        let id = ElementId::next();
        let scheduler: Rc<dyn Scheduler> = self.dirty.clone();
        let context = Context::new(id, scope, scheduler);
        let node = match widget {
            Widget::Provider { provider, .. } => Some(provider.mount(context.clone())),
            _ => None,
        };
        self.elements.insert(
            id,
            Element {
                widget: widget.clone(),
                context,
                parent,
                depth,
                children: Vec::new(),
                node: node.clone(),
                active: true,
            },
        );
        if let Some(Key::Global(global)) = widget.key() {
            self.global_keys.insert(*global, id);
        }
        self.stats.mounted += 1;
        tracing::trace!(message = "tree.mount", element = id.get(), kind = widget.kind(), depth);

        let built = match node {
            Some(node) => node.attach().and_then(|()| self.build_children(id, widget)),
            None => self.build_children(id, widget),
        };
        if let Err(err) = built {
            self.deactivate(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Apply `widget` to an element mounted from a compatible one.
    fn update(&mut self, id: ElementId, widget: &Widget, scope: Scope) -> Result<()> {
        let Some(element) = self.elements.get_mut(&id) else {
            return Ok(());
        };
        element.context.set_scope(scope);
        if element.widget.same_instance(widget) && !self.dirty.is_dirty(id) {
            return Ok(());
        }
        element.widget = widget.clone();
        let node = element.node.clone();
        self.dirty.take(id);
        self.stats.rebuilt += 1;

        if let (Widget::Provider { provider, .. }, Some(node)) = (widget, &node) {
            provider.update(node)?;
        }
        self.build_children(id, widget)
    }

    /// Rebuild a dirty element with its current widget.
    fn rebuild(&mut self, id: ElementId) -> Result<()> {
        self.dirty.take(id);
        let Some(element) = self.elements.get(&id) else {
            return Ok(());
        };
        let widget = element.widget.clone();
        let node = element.node.clone();
        self.stats.rebuilt += 1;

        match (&widget, node) {
            // A provider is only dirty when something its own factory or
            // refresh watched has changed.
            (Widget::Provider { .. }, Some(node)) => node.refresh_from_dependencies().map(|_| ()),
            _ => self.build_children(id, &widget),
        }
    }

    fn build_children(&mut self, id: ElementId, widget: &Widget) -> Result<()> {
        let Some(element) = self.elements.get(&id) else {
            return Ok(());
        };
        let context = element.context.clone();
        let old = element.children.clone();
        let depth = element.depth + 1;
        let scope = element.child_scope();

        let children = match widget {
            Widget::Empty { .. } => Vec::new(),
            Widget::Provider { child, .. } => {
                vec![self.update_child(Some(id), old.first().copied(), child, scope, depth)?]
            }
            Widget::Builder { build, .. } => {
                context.begin_build();
                let next = build(&context)?;
                vec![self.update_child(Some(id), old.first().copied(), &next, scope, depth)?]
            }
            Widget::Column { children, .. } => {
                self.update_children(id, old, children, &scope, depth)?
            }
        };
        if let Some(element) = self.elements.get_mut(&id) {
            element.children = children;
        }
        Ok(())
    }

    // ─── Relocation ──────────────────────────────────────────────────────────

    fn retake(&mut self, id: ElementId, parent: Option<ElementId>, depth: usize, scope: Scope) {
        self.forget_child(id);
        self.inactive.retain(|inactive| *inactive != id);
        self.stats.relocated += 1;
        tracing::debug!(message = "tree.relocate", element = id.get(), depth);
        self.adopt(id, parent, depth, scope);
    }

    /// Move a subtree under a new ancestor scope. Provider nodes are kept;
    /// every element drops its registrations and rebuilds.
    fn adopt(&mut self, id: ElementId, parent: Option<ElementId>, depth: usize, scope: Scope) {
        let Some(element) = self.elements.get_mut(&id) else {
            return;
        };
        element.parent = parent;
        element.depth = depth;
        element.active = true;
        element.context.set_scope(scope);
        element.context.reset_dependencies();
        let children = element.children.clone();
        let child_scope = element.child_scope();
        self.dirty.mark_needs_build(id);

        for child in children {
            self.adopt(child, Some(id), depth + 1, child_scope.clone());
        }
    }

    fn forget_child(&mut self, id: ElementId) {
        let parent = self.elements.get(&id).and_then(|element| element.parent);
        if let Some(parent) = parent.and_then(|parent| self.elements.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }
    }

    // ─── Removal ─────────────────────────────────────────────────────────────

    fn deactivate(&mut self, id: ElementId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(element) = self.elements.get_mut(&next) {
                element.active = false;
                stack.extend(element.children.iter().copied());
            }
        }
        self.inactive.push(id);
    }

    fn finalize(&mut self) -> Result<()> {
        let mut outcome = Ok(());
        for id in std::mem::take(&mut self.inactive) {
            let still_inactive = self.elements.get(&id).is_some_and(|element| !element.active);
            if still_inactive && let Err(err) = self.unmount(id) {
                outcome = outcome.and(Err(err));
            }
        }
        outcome
    }

    /// Children first, so teardowns can still read their ancestors.
    fn unmount(&mut self, id: ElementId) -> Result<()> {
        let Some(element) = self.elements.get(&id) else {
            return Ok(());
        };
        let mut outcome = Ok(());
        for child in element.children.clone() {
            if self.owned_by(child, Some(id))
                && let Err(err) = self.unmount(child)
            {
                outcome = outcome.and(Err(err));
            }
        }

        let Some(element) = self.elements.remove(&id) else {
            return outcome;
        };
        element.context.unmount();
        if let Some(node) = &element.node
            && let Err(err) = node.detach()
        {
            outcome = outcome.and(Err(err));
        }
        if let Some(Key::Global(global)) = element.widget.key()
            && self.global_keys.get(global) == Some(&id)
        {
            self.global_keys.remove(global);
        }
        self.dirty.take(id);
        self.stats.unmounted += 1;
        outcome
    }
}
