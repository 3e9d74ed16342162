#![forbid(unsafe_code)]

//! lineage public facade crate.
//!
//! Providers, the access methods on [`Context`](prelude::Context) and, with
//! the `harness` feature, the reference host tree.

pub mod prelude {
    pub use lineage_core as core;
    #[cfg(feature = "harness")]
    pub use lineage_harness as harness;

    pub use lineage_core::misuse::{flag_observable_type, set_misuse_checks};
    pub use lineage_core::{
        AnyInherited, AnyProvider, Context, ErrorKind, InheritedNode, InvalidState, Provider,
        ProviderError, ProviderStyle, Result, Scheduler, Scope,
    };
    #[cfg(feature = "harness")]
    pub use lineage_harness::{Key, MultiProvider, Tree, Widget, consumer, selector};
}
