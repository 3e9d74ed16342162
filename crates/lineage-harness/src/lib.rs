#![forbid(unsafe_code)]

//! Reference host for `lineage-core` providers.
//!
//! A small element tree ([`Tree`]) with widget reconciliation, keyed and
//! global-key relocation, a dirty-set scheduler and post-order unmounting.
//! It implements the host side of the provider contract and serves as the
//! test bed for the provider crates.

pub mod consumer;
pub mod logging;
pub mod multi;
pub mod tree;
pub mod widget;

pub use consumer::{consumer, selector};
pub use multi::MultiProvider;
pub use tree::{Tree, TreeStats};
pub use widget::{Key, Widget};
