#![forbid(unsafe_code)]

//! Flattened nesting of several providers.

use std::rc::Rc;

use lineage_core::{AnyProvider, Provider};

use crate::widget::Widget;

/// Builds `Provider(a, Provider(b, ... child))` from a flat list.
///
/// The first provider added is the outermost, so later providers can read
/// earlier ones from their factories.
#[derive(Default)]
pub struct MultiProvider {
    providers: Vec<Rc<dyn AnyProvider>>,
}

impl MultiProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider<T: Clone + 'static>(self, provider: Provider<T>) -> Self {
        self.provider_any(provider.into_any())
    }

    #[must_use]
    pub fn provider_any(mut self, provider: Rc<dyn AnyProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Nest the providers around `child`. With no providers, `child` itself.
    #[must_use]
    pub fn child(self, child: Widget) -> Widget {
        self.providers
            .into_iter()
            .rev()
            .fold(child, |inner, provider| Widget::provider_any(provider, inner))
    }
}
