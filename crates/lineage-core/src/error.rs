#![forbid(unsafe_code)]

use thiserror::Error;

use crate::context::ElementId;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Coarse classification of a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No provider of the requested type above the requester.
    NotFound,
    /// A nullable provider was found but holds `None`.
    UnexpectedNull,
    /// The provider was used out of its lifecycle order.
    InvalidState,
}

/// Why a provider operation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InvalidState {
    #[error("the provider was already disposed")]
    Disposed,
    #[error("the provider is not attached to the tree yet")]
    NotAttached,
    #[error("the provider is already attached")]
    AlreadyAttached,
    #[error("the provider value was requested while it was being created")]
    CircularConstruction,
    #[error("read, watch and select cannot be used while a select projector runs")]
    ReentrantSelect,
    #[error("a create provider and a value provider cannot update each other")]
    IncompatibleUpdate,
    #[error("the same global key was placed twice in one build pass")]
    DuplicateGlobalKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no Provider<{type_name}> found above {requester}")]
    NotFound {
        type_name: &'static str,
        requester: ElementId,
    },

    #[error(
        "the provider of Option<{type_name}> above {requester} holds None, but a \
         non-optional {type_name} was requested (use the *_optional accessors)"
    )]
    UnexpectedNull {
        type_name: &'static str,
        requester: ElementId,
    },

    #[error("Provider<{type_name}>: {reason}")]
    InvalidState {
        type_name: &'static str,
        reason: InvalidState,
    },
}

impl ProviderError {
    #[must_use]
    pub fn not_found<T: ?Sized>(requester: ElementId) -> Self {
        Self::NotFound {
            type_name: std::any::type_name::<T>(),
            requester,
        }
    }

    #[must_use]
    pub fn unexpected_null<T: ?Sized>(requester: ElementId) -> Self {
        Self::UnexpectedNull {
            type_name: std::any::type_name::<T>(),
            requester,
        }
    }

    #[must_use]
    pub fn invalid_state<T: ?Sized>(reason: InvalidState) -> Self {
        Self::InvalidState {
            type_name: std::any::type_name::<T>(),
            reason,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnexpectedNull { .. } => ErrorKind::UnexpectedNull,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// The lifecycle violation, for `InvalidState` errors.
    #[must_use]
    pub fn invalid_reason(&self) -> Option<InvalidState> {
        match self {
            Self::InvalidState { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NotFound { type_name, .. }
            | Self::UnexpectedNull { type_name, .. }
            | Self::InvalidState { type_name, .. } => type_name,
        }
    }
}
