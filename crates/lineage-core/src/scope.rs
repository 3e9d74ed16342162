#![forbid(unsafe_code)]

//! Nearest-ancestor provider registry.
//!
//! A [`Scope`] maps each provided type to the nearest enclosing node. Hosts
//! keep one scope per element: children of a provider receive
//! `parent_scope.provide(node)`, everybody else inherits the parent's scope
//! unchanged. The map is persistent (`im::HashMap`), so extending a scope
//! shares structure with its parent and lookups stay O(1) regardless of depth.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use im::HashMap;

use crate::node::AnyInherited;

#[derive(Clone)]
struct ScopeEntry {
    /// Number of `provide` calls between the root and this entry.
    depth: usize,
    node: Rc<dyn AnyInherited>,
}

/// The providers visible from one tree position.
#[derive(Clone, Default)]
pub struct Scope {
    entries: HashMap<TypeId, ScopeEntry>,
    depth: usize,
}

impl Scope {
    /// An empty scope, for the root of a tree.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// A scope where `node` shadows any provider of the same type.
    #[must_use]
    pub fn provide(&self, node: Rc<dyn AnyInherited>) -> Self {
        let depth = self.depth + 1;
        let entries = self.entries.update(node.key(), ScopeEntry { depth, node });
        Self { entries, depth }
    }

    /// The nearest provider registered under `key`.
    #[must_use]
    pub fn lookup(&self, key: TypeId) -> Option<Rc<dyn AnyInherited>> {
        self.entries.get(&key).map(|entry| Rc::clone(&entry.node))
    }

    /// The nearest provider registered under any of `keys`.
    ///
    /// When several keys match, the innermost provider wins.
    #[must_use]
    pub fn nearest(&self, keys: &[TypeId]) -> Option<(TypeId, Rc<dyn AnyInherited>)> {
        keys.iter()
            .filter_map(|key| self.entries.get(key).map(|entry| (*key, entry)))
            .max_by_key(|(_, entry)| entry.depth)
            .map(|(key, entry)| (key, Rc::clone(&entry.node)))
    }

    #[must_use]
    pub fn contains(&self, key: TypeId) -> bool {
        self.entries.contains_key(&key)
    }

    /// Number of providers stacked above this position (shadowed ones
    /// included).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of distinct provided types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&'static str> =
            self.entries.values().map(|entry| entry.node.type_name()).collect();
        types.sort_unstable();
        f.debug_struct("Scope")
            .field("depth", &self.depth)
            .field("types", &types)
            .finish()
    }
}
