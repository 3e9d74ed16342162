#![forbid(unsafe_code)]

//! Inherited-value propagation for tree-structured UI runtimes.
//!
//! A value created by a [`Provider`] at one point of an element tree can be
//! read, observed and disposed by any descendant without threading references
//! through constructors.
//!
//! - [`ValueSlot`]: the uninitialized / computed / released cell holding a
//!   provided value.
//! - [`Lifecycle`]: lazy (or eager) construction, rebuild updates and
//!   disposal of one slot.
//! - [`InheritedNode`]: the tree-attached node exposing the value to
//!   descendants and notifying registered dependents.
//! - [`Context`]: the per-element handle carrying the ancestor [`Scope`];
//!   `read`, `watch` and `select` live on it.
//!
//! # Architecture
//!
//! Everything is single-threaded: nodes and contexts are shared through `Rc`
//! and mutated through `RefCell`/`Cell`. The host tree owns the elements and
//! drives the lifecycle (attach, update, detach) through the erased
//! [`AnyProvider`] / [`AnyInherited`] traits, and schedules rebuilds through
//! its [`Scheduler`].
//!
//! # Invariants
//!
//! 1. A lazy provider runs its factory at most once, on first access.
//! 2. An eager provider runs its factory exactly once, at attach time.
//! 3. Teardown runs exactly once per constructed value, after detach, and
//!    never for a provider that was not read.
//! 4. `update_should_notify` is only consulted when a rebuild swaps or
//!    re-derives the value.
//! 5. Lookup resolves to the nearest enclosing provider of `T` or `Option<T>`.
//! 6. No `RefCell` borrow is held while user callbacks run.

pub mod access;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod misuse;
pub mod node;
pub mod provider;
pub mod scope;
pub mod slot;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use access::is_selecting;
pub use context::{Context, ElementId, Scheduler};
pub use error::{ErrorKind, InvalidState, ProviderError, Result};
pub use lifecycle::{Lifecycle, Phase};
pub use node::{AnyInherited, InheritedNode};
pub use provider::{AnyProvider, Provider, ProviderStyle};
pub use scope::Scope;
pub use slot::ValueSlot;
