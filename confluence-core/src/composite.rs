//! Merged state produced by reconciliation.
//!
//! `CompositeState` extends [`State`] with optional fallback content in the
//! loading and error cases. A fallback value is only ever attached after a
//! cache compatibility check against the composite's own impulse; consumers
//! do not re-validate it.

use serde::{Deserialize, Serialize};

use crate::error::DatasourceError;
use crate::impulse::LoadImpulse;
use crate::parameters::{LoadImpulseType, Parameters, StateValue};
use crate::state::{DatasourceState, ProvisioningState, State};

/// Composite state matching a state type.
///
/// `CompositeOf<CompositeState<V, P, T, E>>` is `CompositeState<V, P, T, E>`,
/// so merged states can be merged again.
pub type CompositeOf<S> = CompositeState<
    <S as DatasourceState>::Value,
    <S as DatasourceState>::Params,
    <S as DatasourceState>::ImpulseType,
    <S as DatasourceState>::Error,
>;

/// Best known state across several sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "case", rename_all = "snake_case")]
pub enum CompositeState<V, P, T, E> {
    NotReady,
    /// A request is in flight; earlier compatible content may be shown.
    Loading {
        fallback_value: Option<V>,
        fallback_error: Option<E>,
        load_impulse: LoadImpulse<P, T>,
    },
    /// Authoritative value. Never carries a fallback.
    Success {
        value: V,
        load_impulse: LoadImpulse<P, T>,
    },
    /// The request failed; earlier compatible content may be shown beside it.
    Error {
        error: E,
        fallback_value: Option<V>,
        load_impulse: LoadImpulse<P, T>,
    },
}

impl<V, P, T, E> CompositeState<V, P, T, E> {
    /// Fallback value of a loading or error state.
    pub fn fallback_value(&self) -> Option<&V> {
        match self {
            CompositeState::Loading { fallback_value, .. }
            | CompositeState::Error { fallback_value, .. } => fallback_value.as_ref(),
            CompositeState::NotReady | CompositeState::Success { .. } => None,
        }
    }
}

impl<V, P, T, E> From<State<V, P, T, E>> for CompositeState<V, P, T, E> {
    fn from(state: State<V, P, T, E>) -> Self {
        match state {
            State::NotReady => CompositeState::NotReady,
            State::Loading { load_impulse } => CompositeState::Loading {
                fallback_value: None,
                fallback_error: None,
                load_impulse,
            },
            State::Success {
                value,
                load_impulse,
            } => CompositeState::Success {
                value,
                load_impulse,
            },
            State::Error {
                error,
                load_impulse,
            } => CompositeState::Error {
                error,
                fallback_value: None,
                load_impulse,
            },
        }
    }
}

impl<V, P, T, E> DatasourceState for CompositeState<V, P, T, E>
where
    V: StateValue,
    P: Parameters,
    T: LoadImpulseType,
    E: DatasourceError,
{
    type Value = V;
    type Params = P;
    type ImpulseType = T;
    type Error = E;

    fn not_ready() -> Self {
        CompositeState::NotReady
    }

    fn from_error(error: E, load_impulse: LoadImpulse<P, T>) -> Self {
        CompositeState::Error {
            error,
            fallback_value: None,
            load_impulse,
        }
    }

    fn provisioning_state(&self) -> ProvisioningState {
        match self {
            CompositeState::NotReady => ProvisioningState::NotReady,
            CompositeState::Loading { .. } => ProvisioningState::Loading,
            CompositeState::Success { .. } | CompositeState::Error { .. } => {
                ProvisioningState::Result
            }
        }
    }

    fn load_impulse(&self) -> Option<&LoadImpulse<P, T>> {
        match self {
            CompositeState::NotReady => None,
            CompositeState::Loading { load_impulse, .. }
            | CompositeState::Success { load_impulse, .. }
            | CompositeState::Error { load_impulse, .. } => Some(load_impulse),
        }
    }

    fn value(&self) -> Option<&V> {
        match self {
            CompositeState::Success { value, .. } => Some(value),
            CompositeState::Loading { fallback_value, .. }
            | CompositeState::Error { fallback_value, .. } => fallback_value.as_ref(),
            CompositeState::NotReady => None,
        }
    }

    fn error(&self) -> Option<&E> {
        match self {
            CompositeState::Error { error, .. } => Some(error),
            CompositeState::Loading { fallback_error, .. } => fallback_error.as_ref(),
            CompositeState::NotReady | CompositeState::Success { .. } => None,
        }
    }
}
