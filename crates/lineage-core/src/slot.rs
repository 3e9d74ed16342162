#![forbid(unsafe_code)]

//! Storage cell for a provided value.
//!
//! A slot moves `Uninitialized → Computed → Released` and never goes back.
//! Value-mode providers may [`swap`](ValueSlot::swap) a computed value in
//! place; nothing else rewrites it.

use std::mem;

#[derive(Debug)]
enum SlotState<T> {
    Uninitialized,
    Computed(T),
    Released,
}

/// Holds at most one provided value over a node's lifetime.
#[derive(Debug)]
pub struct ValueSlot<T> {
    state: SlotState<T>,
}

impl<T> ValueSlot<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SlotState::Uninitialized,
        }
    }

    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self.state, SlotState::Computed(_))
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        matches!(self.state, SlotState::Released)
    }

    #[must_use]
    pub fn get(&self) -> Option<&T> {
        match &self.state {
            SlotState::Computed(value) => Some(value),
            _ => None,
        }
    }

    /// Store the first value.
    ///
    /// Hands `value` back if the slot was already computed or released.
    pub fn fill(&mut self, value: T) -> Result<(), T> {
        match self.state {
            SlotState::Uninitialized => {
                self.state = SlotState::Computed(value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    /// Replace a computed value, returning the previous one.
    ///
    /// Hands `value` back if nothing was computed yet.
    pub fn swap(&mut self, value: T) -> Result<T, T> {
        match &mut self.state {
            SlotState::Computed(current) => Ok(mem::replace(current, value)),
            _ => Err(value),
        }
    }

    /// Release the slot for good, returning the value if one was computed.
    pub fn release(&mut self) -> Option<T> {
        match mem::replace(&mut self.state, SlotState::Released) {
            SlotState::Computed(value) => Some(value),
            SlotState::Uninitialized | SlotState::Released => None,
        }
    }
}

impl<T> Default for ValueSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_once() {
        let mut slot = ValueSlot::new();
        assert!(!slot.is_computed());
        assert_eq!(slot.get(), None);

        assert_eq!(slot.fill(1), Ok(()));
        assert!(slot.is_computed());
        assert_eq!(slot.get(), Some(&1));

        assert_eq!(slot.fill(2), Err(2));
        assert_eq!(slot.get(), Some(&1));
    }

    #[test]
    fn swap_requires_a_value() {
        let mut slot = ValueSlot::new();
        assert_eq!(slot.swap(5), Err(5));

        slot.fill(1).unwrap();
        assert_eq!(slot.swap(2), Ok(1));
        assert_eq!(slot.get(), Some(&2));
    }

    #[test]
    fn release_is_final() {
        let mut slot = ValueSlot::new();
        slot.fill("a").unwrap();
        assert_eq!(slot.release(), Some("a"));
        assert!(slot.is_released());
        assert_eq!(slot.release(), None);
        assert_eq!(slot.fill("b"), Err("b"));
        assert_eq!(slot.swap("c"), Err("c"));
    }

    #[test]
    fn release_uninitialized_yields_nothing() {
        let mut slot = ValueSlot::<String>::default();
        assert_eq!(slot.release(), None);
        assert!(slot.is_released());
        assert!(!slot.is_computed());
    }
}
