#![forbid(unsafe_code)]

//! Lazy lifecycle controller for one provided value.
//!
//! # Design
//!
//! [`Lifecycle<T>`] owns the provider configuration and the [`ValueSlot`]
//! holding the value. The host drives it through four operations:
//!
//! - `attach`: once, when the node enters the tree. Value providers store
//!   their value; eager create providers construct it.
//! - `obtain`: returns the value, constructing it on first call.
//! - `update`: the node was rebuilt with a new configuration but kept its
//!   identity. Create providers keep their value; value providers swap it and
//!   report whether dependents must be notified.
//! - `detach`: once, when the node leaves the tree for good. The teardown
//!   runs only if a value was constructed.
//!
//! All state sits behind `Cell`/`RefCell`, and callbacks (factory, refresh,
//! teardown, predicate) are cloned out before being called, so no borrow is
//! held while user code runs.
//!
//! # Invariants
//!
//! 1. The factory runs at most once per lifecycle.
//! 2. The teardown runs at most once, after `detach`, and only on a value the
//!    factory produced.
//! 3. After `detach` every operation fails with `InvalidState::Disposed`.
//! 4. The update predicate is never consulted for a create provider without
//!    a refresh callback.
//!
//! # Failure Modes
//!
//! - **Factory fails or panics**: the slot stays uninitialized and the phase
//!   returns to `Attached`; the error reaches the caller of `obtain` (or
//!   `attach`, for eager providers) and the next `obtain` retries.
//! - **Refresh fails**: the previous value stays in the slot.
//! - **Teardown panics**: the slot is already released and the phase is
//!   `Detached`; the panic reaches whoever detached the node.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{InvalidState, ProviderError, Result};
use crate::misuse;
use crate::provider::{Provider, ProviderStyle, Source};
use crate::slot::ValueSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created by the host, not attached yet.
    Pending,
    Attached,
    /// The factory or refresh callback is running.
    Constructing,
    Detached,
}

/// Restores the previous phase when dropped, panics included.
struct PhaseGuard<'a> {
    phase: &'a Cell<Phase>,
    previous: Phase,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a Cell<Phase>, next: Phase) -> Self {
        let previous = phase.replace(next);
        Self { phase, previous }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.set(self.previous);
    }
}

/// Drives construction, update and disposal of one provided value.
pub struct Lifecycle<T> {
    config: RefCell<Provider<T>>,
    slot: RefCell<ValueSlot<T>>,
    phase: Cell<Phase>,
}

impl<T: Clone + 'static> Lifecycle<T> {
    #[must_use]
    pub fn new(config: Provider<T>) -> Self {
        Self {
            config: RefCell::new(config),
            slot: RefCell::new(ValueSlot::new()),
            phase: Cell::new(Phase::Pending),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    #[must_use]
    pub fn style(&self) -> ProviderStyle {
        self.config.borrow().style()
    }

    /// Whether a value is currently stored.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.slot.borrow().is_computed()
    }

    /// The stored value, without constructing it.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.slot.borrow().get().cloned()
    }

    pub fn attach(&self, cx: &Context) -> Result<()> {
        match self.phase.get() {
            Phase::Pending => {}
            Phase::Detached => return Err(Self::invalid(InvalidState::Disposed)),
            Phase::Attached | Phase::Constructing => {
                return Err(Self::invalid(InvalidState::AlreadyAttached));
            }
        }
        self.phase.set(Phase::Attached);

        let (value, eager) = {
            let config = self.config.borrow();
            match &config.source {
                Source::Value(value) => (Some(value.clone()), false),
                Source::Create { lazy, .. } => (None, !*lazy),
            }
        };
        if let Some(value) = value {
            return self
                .slot
                .borrow_mut()
                .fill(value)
                .map_err(|_| Self::invalid(InvalidState::AlreadyAttached));
        }
        if eager {
            self.construct(cx)?;
        }
        Ok(())
    }

    pub fn obtain(&self, cx: &Context) -> Result<T> {
        match self.phase.get() {
            Phase::Attached => {}
            Phase::Pending => return Err(Self::invalid(InvalidState::NotAttached)),
            Phase::Constructing => return Err(Self::invalid(InvalidState::CircularConstruction)),
            Phase::Detached => return Err(Self::invalid(InvalidState::Disposed)),
        }
        if let Some(value) = self.peek() {
            return Ok(value);
        }
        self.construct(cx)
    }

    /// Apply a new configuration. Returns whether dependents must be notified.
    pub fn update(&self, cx: &Context, next: Provider<T>) -> Result<bool> {
        if self.phase.get() == Phase::Detached {
            return Err(Self::invalid(InvalidState::Disposed));
        }
        if self.style() != next.style() {
            return Err(Self::invalid(InvalidState::IncompatibleUpdate));
        }

        let previous = self.config.replace(next);
        let Source::Value(old) = &previous.source else {
            // Create providers keep their value; only a refresh callback may
            // re-derive it.
            return self.refresh_created(cx);
        };
        let new = match &self.config.borrow().source {
            Source::Value(new) => new.clone(),
            Source::Create { .. } => return Err(Self::invalid(InvalidState::IncompatibleUpdate)),
        };

        let notify = previous
            .predicate()
            .is_none_or(|predicate| predicate(old, &new));
        if self.phase.get() == Phase::Attached {
            // Nothing to swap before attach: attach reads the new config.
            let _previous = self.slot.borrow_mut().swap(new);
        }
        Ok(notify)
    }

    /// Re-run the refresh callback because something the provider depends on
    /// changed. Returns whether dependents must be notified.
    pub fn refresh_from_dependencies(&self, cx: &Context) -> Result<bool> {
        if self.phase.get() == Phase::Detached {
            return Err(Self::invalid(InvalidState::Disposed));
        }
        self.refresh_created(cx)
    }

    pub fn detach(&self, cx: &Context) -> Result<()> {
        match self.phase.get() {
            Phase::Detached => return Err(Self::invalid(InvalidState::Disposed)),
            Phase::Constructing => return Err(Self::invalid(InvalidState::CircularConstruction)),
            Phase::Pending | Phase::Attached => {}
        }
        self.phase.set(Phase::Detached);

        let value = self.slot.borrow_mut().release();
        let teardown = match &self.config.borrow().source {
            Source::Create { teardown, .. } => teardown.clone(),
            Source::Value(_) => None,
        };
        if let (Some(value), Some(teardown)) = (value, teardown) {
            tracing::debug!(
                message = "provider.dispose",
                type_name = type_name::<T>(),
                element = cx.element().get()
            );
            teardown(cx, value);
        }
        Ok(())
    }

    fn construct(&self, cx: &Context) -> Result<T> {
        let (factory, refresh) = {
            let config = self.config.borrow();
            match &config.source {
                Source::Create {
                    factory, refresh, ..
                } => (Rc::clone(factory), refresh.clone()),
                Source::Value(value) => return Ok(value.clone()),
            }
        };

        let value = {
            let _phase = PhaseGuard::enter(&self.phase, Phase::Constructing);
            let value = factory(cx)?;
            match refresh {
                Some(refresh) => refresh(cx, value)?,
                None => value,
            }
        };
        misuse::check_value_type::<T>();
        tracing::debug!(
            message = "provider.create",
            type_name = type_name::<T>(),
            element = cx.element().get()
        );

        self.slot
            .borrow_mut()
            .fill(value.clone())
            .map_err(|_| Self::invalid(InvalidState::CircularConstruction))?;
        Ok(value)
    }

    fn refresh_created(&self, cx: &Context) -> Result<bool> {
        if self.phase.get() != Phase::Attached {
            return Ok(false);
        }
        let (refresh, predicate) = {
            let config = self.config.borrow();
            match &config.source {
                Source::Create { refresh, .. } => (refresh.clone(), config.predicate()),
                Source::Value(_) => (None, None),
            }
        };
        let (Some(refresh), Some(previous)) = (refresh, self.peek()) else {
            return Ok(false);
        };

        let next = {
            let _phase = PhaseGuard::enter(&self.phase, Phase::Constructing);
            refresh(cx, previous.clone())?
        };
        let notify = predicate.is_none_or(|predicate| predicate(&previous, &next));
        let _previous = self.slot.borrow_mut().swap(next);
        Ok(notify)
    }

    fn invalid(reason: InvalidState) -> ProviderError {
        ProviderError::invalid_state::<T>(reason)
    }
}

impl<T: fmt::Debug> fmt::Debug for Lifecycle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("phase", &self.phase.get())
            .field("slot", &*self.slot.borrow())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
