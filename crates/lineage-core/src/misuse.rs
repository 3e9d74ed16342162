#![forbid(unsafe_code)]

//! Development-time guard against providing the wrong kind of value.
//!
//! Some types are change sources on their own (observables, channels,
//! streams). Exposing one through a plain [`Provider`](crate::Provider) means
//! dependents never rebuild when it changes, which is almost always a mistake:
//! a dedicated provider flavor that listens to the source should be used
//! instead.
//!
//! Register such types with [`flag_observable_type`]. In debug builds, every
//! value provider created for a flagged type and every created value of a
//! flagged type emits a `WARN` event named `provider.misuse`. The check never
//! fails the operation, and release builds compile it out.
//!
//! The registry and the counter are per thread, like the rest of the crate.

use std::any::TypeId;
use std::cell::{Cell, RefCell};

#[cfg_attr(not(debug_assertions), allow(dead_code))]
struct FlaggedType {
    id: TypeId,
    type_name: &'static str,
    hint: &'static str,
}

thread_local! {
    static FLAGGED: RefCell<Vec<FlaggedType>> = const { RefCell::new(Vec::new()) };
    static ENABLED: Cell<bool> = const { Cell::new(true) };
    static WARNINGS: Cell<u64> = const { Cell::new(0) };
}

/// Flag `T` as a change source that should not be provided as a plain value.
///
/// `hint` is appended to the warning, e.g. the provider flavor to use instead.
pub fn flag_observable_type<T: 'static>(hint: &'static str) {
    FLAGGED.with(|flagged| {
        let mut flagged = flagged.borrow_mut();
        let id = TypeId::of::<T>();
        if let Some(existing) = flagged.iter_mut().find(|entry| entry.id == id) {
            existing.hint = hint;
        } else {
            flagged.push(FlaggedType {
                id,
                type_name: std::any::type_name::<T>(),
                hint,
            });
        }
    });
}

/// Forget every flagged type.
pub fn clear_flagged_types() {
    FLAGGED.with(|flagged| flagged.borrow_mut().clear());
}

/// Turn the check on or off for the current thread (on by default).
pub fn set_misuse_checks(enabled: bool) {
    ENABLED.with(|cell| cell.set(enabled));
}

/// Warnings emitted on the current thread so far.
#[must_use]
pub fn misuse_warnings_total() -> u64 {
    WARNINGS.with(Cell::get)
}

pub(crate) fn check_value_type<T: 'static>() {
    #[cfg(debug_assertions)]
    {
        if !ENABLED.with(Cell::get) {
            return;
        }
        let id = TypeId::of::<T>();
        let flagged = FLAGGED.with(|flagged| {
            flagged
                .borrow()
                .iter()
                .find(|entry| entry.id == id)
                .map(|entry| (entry.type_name, entry.hint))
        });
        if let Some((type_name, hint)) = flagged {
            WARNINGS.with(|count| count.set(count.get() + 1));
            tracing::warn!(
                message = "provider.misuse",
                type_name,
                hint,
                detail = "value is a change source; dependents will not rebuild when it changes"
            );
        }
    }
}
