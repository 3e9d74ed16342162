#![forbid(unsafe_code)]

//! Access discipline: how a dependent obtains provided values.
//!
//! | accessor | registers | rebuilds on |
//! |----------|-----------|-------------|
//! | [`Context::read`] | nothing | never |
//! | [`Context::watch`] | the element | every notified change |
//! | [`Context::select`] | a filter | changes of the projected value |
//!
//! Lookup checks both `T` and `Option<T>` providers; the nearest one wins.
//! A nullable provider holding `None` is an [`UnexpectedNull`] error for the
//! plain accessors and `Ok(None)` for the `*_optional` ones, so callers can
//! tell "nothing provided" apart from "provided as empty".
//!
//! While a `select` projector (or a selector filter during notification) runs,
//! every accessor fails with [`InvalidState::ReentrantSelect`].
//!
//! [`UnexpectedNull`]: crate::ProviderError::UnexpectedNull

use std::any::{TypeId, type_name};
use std::cell::Cell;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{InvalidState, ProviderError, Result};
use crate::node::{AnyInherited, Filter, InheritedNode};

thread_local! {
    static SELECTING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running a projector until dropped.
pub(crate) struct SelectGuard {
    previous: bool,
}

impl SelectGuard {
    pub(crate) fn enter() -> Self {
        Self {
            previous: SELECTING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for SelectGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        SELECTING.with(|flag| flag.set(previous));
    }
}

/// Whether a `select` projector is running on this thread.
#[must_use]
pub fn is_selecting() -> bool {
    SELECTING.with(Cell::get)
}

enum Resolved<T> {
    Plain(Rc<InheritedNode<T>>),
    Nullable(Rc<InheritedNode<Option<T>>>),
}

impl<T: Clone + 'static> Resolved<T> {
    fn erased(&self) -> Rc<dyn AnyInherited> {
        match self {
            Self::Plain(node) => Rc::clone(node) as Rc<dyn AnyInherited>,
            Self::Nullable(node) => Rc::clone(node) as Rc<dyn AnyInherited>,
        }
    }

    /// `Ok(None)` only for a nullable provider holding `None`.
    fn obtain(&self) -> Result<Option<T>> {
        match self {
            Self::Plain(node) => node.obtain().map(Some),
            Self::Nullable(node) => node.obtain(),
        }
    }
}

impl Context {
    fn resolve<T: Clone + 'static>(&self) -> Result<Option<Resolved<T>>> {
        if is_selecting() {
            return Err(ProviderError::invalid_state::<T>(
                InvalidState::ReentrantSelect,
            ));
        }

        let plain = TypeId::of::<T>();
        let nullable = TypeId::of::<Option<T>>();
        let found = self.scope().nearest(&[plain, nullable]);
        tracing::trace!(
            message = "provider.lookup",
            type_name = type_name::<T>(),
            requester = self.element().get(),
            found = found.is_some()
        );
        let Some((key, node)) = found else {
            return Ok(None);
        };

        let node = node.as_any();
        let resolved = if key == plain {
            node.downcast::<InheritedNode<T>>().map(Resolved::Plain)
        } else {
            node.downcast::<InheritedNode<Option<T>>>()
                .map(Resolved::Nullable)
        };
        resolved
            .map(Some)
            .map_err(|_| ProviderError::invalid_state::<T>(InvalidState::IncompatibleUpdate))
    }

    fn required<T>(&self, value: Option<Option<T>>) -> Result<T> {
        match value {
            None => Err(ProviderError::not_found::<T>(self.element())),
            Some(None) => Err(ProviderError::unexpected_null::<T>(self.element())),
            Some(Some(value)) => Ok(value),
        }
    }

    fn obtain_optional<T: Clone + 'static>(&self, listen: bool) -> Result<Option<Option<T>>> {
        let Some(resolved) = self.resolve::<T>()? else {
            return Ok(None);
        };
        if listen {
            self.register::<T>(&resolved, None);
        }
        resolved.obtain().map(Some)
    }

    fn register<T: Clone + 'static>(&self, resolved: &Resolved<T>, filter: Option<Filter<T>>) {
        let element = self.element();
        match (resolved, filter) {
            (Resolved::Plain(node), filter) => node.add_dependent(element, filter),
            (Resolved::Nullable(node), None) => node.add_dependent(element, None),
            (Resolved::Nullable(node), Some(filter)) => {
                // An empty value always rebuilds a selector; the projector
                // cannot run on it.
                let filter: Filter<Option<T>> =
                    Rc::new(move |next: &Option<T>| next.as_ref().is_none_or(|next| filter(next)));
                node.add_dependent(element, Some(filter));
            }
        }
        self.depend_on(resolved.erased());
    }

    /// The nearest `T` without registering a dependency.
    ///
    /// Safe from event handlers, factories and teardowns.
    pub fn read<T: Clone + 'static>(&self) -> Result<T> {
        let value = self.obtain_optional::<T>(false)?;
        self.required(value)
    }

    /// Like [`read`](Context::read), but absence and `None` are `Ok(None)`.
    pub fn read_optional<T: Clone + 'static>(&self) -> Result<Option<T>> {
        Ok(self.obtain_optional::<T>(false)?.flatten())
    }

    /// The nearest `T`, rebuilding this element whenever it changes.
    pub fn watch<T: Clone + 'static>(&self) -> Result<T> {
        let value = self.obtain_optional::<T>(true)?;
        self.required(value)
    }

    /// Like [`watch`](Context::watch), but absence and `None` are `Ok(None)`.
    ///
    /// Nothing is registered when no provider is found.
    pub fn watch_optional<T: Clone + 'static>(&self) -> Result<Option<T>> {
        Ok(self.obtain_optional::<T>(true)?.flatten())
    }

    /// `watch` when `listen` is true, `read` otherwise.
    pub fn of<T: Clone + 'static>(&self, listen: bool) -> Result<T> {
        if listen { self.watch() } else { self.read() }
    }

    /// Project the nearest `T` and rebuild only when the projection changes.
    ///
    /// The projector must be pure: it runs now and again on every notified
    /// change, and may not use any accessor.
    pub fn select<T, R>(&self, projector: impl Fn(&T) -> R + 'static) -> Result<R>
    where
        T: Clone + 'static,
        R: PartialEq + Clone + 'static,
    {
        let Some(resolved) = self.resolve::<T>()? else {
            return Err(ProviderError::not_found::<T>(self.element()));
        };
        let Some(value) = resolved.obtain()? else {
            return Err(ProviderError::unexpected_null::<T>(self.element()));
        };

        let selected = {
            let _guard = SelectGuard::enter();
            projector(&value)
        };
        let last = selected.clone();
        let filter: Filter<T> = Rc::new(move |next: &T| projector(next) != last);
        self.register(&resolved, Some(filter));
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ElementId;
    use crate::error::ErrorKind;
    use crate::provider::Provider;
    use crate::scope::Scope;
    use crate::testing::{RecordingScheduler, mount_provider};

    fn consumer(scope: &Scope, scheduler: &Rc<RecordingScheduler>) -> Context {
        Context::new(ElementId::next(), scope.clone(), scheduler.clone())
    }

    #[test]
    fn nearest_provider_wins() {
        let scheduler = RecordingScheduler::new();
        let (_outer, scope) = mount_provider(&Scope::root(), &scheduler, Provider::value(1_u32));
        let (_other, scope) = mount_provider(&scope, &scheduler, Provider::value("x"));
        let (_inner, scope) = mount_provider(&scope, &scheduler, Provider::value(2_u32));

        let cx = consumer(&scope, &scheduler);
        assert_eq!(cx.read::<u32>(), Ok(2));
        assert_eq!(cx.read::<&str>(), Ok("x"));
    }

    #[test]
    fn missing_and_null_are_distinct() {
        let scheduler = RecordingScheduler::new();
        let cx = consumer(&Scope::root(), &scheduler);
        assert_eq!(cx.read::<u8>().unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(cx.read_optional::<u8>(), Ok(None));

        let (_node, scope) = mount_provider(&Scope::root(), &scheduler, Provider::value(None::<u8>));
        let cx = consumer(&scope, &scheduler);
        assert_eq!(cx.read::<u8>().unwrap_err().kind(), ErrorKind::UnexpectedNull);
        assert_eq!(cx.watch::<u8>().unwrap_err().kind(), ErrorKind::UnexpectedNull);
        assert_eq!(cx.read_optional::<u8>(), Ok(None));
        assert_eq!(cx.read::<Option<u8>>(), Ok(None));
    }

    #[test]
    fn nullable_provider_with_value_satisfies_plain_requests() {
        let scheduler = RecordingScheduler::new();
        let (_node, scope) =
            mount_provider(&Scope::root(), &scheduler, Provider::value(Some(9_u8)));
        let cx = consumer(&scope, &scheduler);
        assert_eq!(cx.read::<u8>(), Ok(9));
        assert_eq!(cx.watch_optional::<u8>(), Ok(Some(9)));
    }

    #[test]
    fn inner_null_shadows_outer_value() {
        let scheduler = RecordingScheduler::new();
        let (_outer, scope) = mount_provider(&Scope::root(), &scheduler, Provider::value(1_u8));
        let (_inner, scope) = mount_provider(&scope, &scheduler, Provider::value(None::<u8>));
        let cx = consumer(&scope, &scheduler);
        assert_eq!(cx.read::<u8>().unwrap_err().kind(), ErrorKind::UnexpectedNull);
    }

    #[test]
    fn of_switches_between_read_and_watch() {
        let scheduler = RecordingScheduler::new();
        let (node, scope) = mount_provider(&Scope::root(), &scheduler, Provider::value(1_u8));
        let cx = consumer(&scope, &scheduler);
        assert_eq!(cx.of::<u8>(false), Ok(1));
        assert_eq!(node.dependent_count(), 0);
        assert_eq!(cx.of::<u8>(true), Ok(1));
        assert_eq!(node.dependent_count(), 1);
    }

    #[test]
    fn watch_optional_without_provider_registers_nothing() {
        let scheduler = RecordingScheduler::new();
        let cx = consumer(&Scope::root(), &scheduler);
        assert_eq!(cx.watch_optional::<String>(), Ok(None));
        assert_eq!(cx.dependency_count(), 0);
    }

    #[test]
    fn select_on_nullable_rebuilds_when_value_disappears() {
        let scheduler = RecordingScheduler::new();
        let (node, scope) =
            mount_provider(&Scope::root(), &scheduler, Provider::value(Some(3_i32)));
        let cx = consumer(&scope, &scheduler);
        assert_eq!(cx.select(|v: &i32| *v > 0), Ok(true));

        node.update(Provider::value(Some(4))).unwrap();
        assert!(scheduler.marks().is_empty());

        node.update(Provider::value(None)).unwrap();
        assert_eq!(scheduler.marks_for(cx.element()), 1);
    }

    #[test]
    fn accessors_inside_projector_are_rejected() {
        let scheduler = RecordingScheduler::new();
        let (_node, scope) = mount_provider(&Scope::root(), &scheduler, Provider::value(1_u8));
        let cx = consumer(&scope, &scheduler);
        let inner = cx.clone();

        let nested = cx.select(move |_: &u8| inner.read::<u8>().map_err(|e| e.invalid_reason()));
        assert_eq!(nested, Ok(Err(Some(InvalidState::ReentrantSelect))));
        assert!(!is_selecting());
        assert_eq!(cx.read::<u8>(), Ok(1));
    }

    #[test]
    fn panicking_projector_releases_the_guard() {
        let scheduler = RecordingScheduler::new();
        let (_node, scope) = mount_provider(&Scope::root(), &scheduler, Provider::value(1_u8));
        let cx = consumer(&scope, &scheduler);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cx.select(|_: &u8| -> u8 { panic!("projector failed") })
        }));
        assert!(outcome.is_err());
        assert!(!is_selecting());
    }
}
