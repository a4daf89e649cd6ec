//! Per-source state model.
//!
//! A source is always in exactly one of four states. Every state except
//! `NotReady` carries the [`LoadImpulse`] that produced it, so values and
//! errors can be checked for cache compatibility against the current
//! request before they are trusted.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::DatasourceError;
use crate::impulse::LoadImpulse;
use crate::parameters::{LoadImpulseType, Parameters, StateValue};

/// Coarse phase of a source, used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    NotReady,
    Loading,
    Result,
}

/// Load impulse type matching a state type.
pub type ImpulseOf<S> =
    LoadImpulse<<S as DatasourceState>::Params, <S as DatasourceState>::ImpulseType>;

// ============================================================================
// CAPABILITY TRAIT
// ============================================================================

/// Read access shared by [`State`] and [`crate::CompositeState`].
///
/// The reconciliation functions are written against this trait so the same
/// merge rules apply to raw source states and to already merged states.
pub trait DatasourceState: Clone + PartialEq + Debug + Send + Sync + 'static {
    type Value: StateValue;
    type Params: Parameters;
    type ImpulseType: LoadImpulseType;
    type Error: DatasourceError;

    /// The `NotReady` state.
    fn not_ready() -> Self;

    /// An error state for `load_impulse`.
    fn from_error(error: Self::Error, load_impulse: ImpulseOf<Self>) -> Self;

    fn provisioning_state(&self) -> ProvisioningState;

    /// Impulse that produced this state. `None` only for `NotReady`.
    fn load_impulse(&self) -> Option<&ImpulseOf<Self>>;

    /// Value carried by this state, authoritative or fallback.
    fn value(&self) -> Option<&Self::Value>;

    /// Error carried by this state, authoritative or fallback.
    fn error(&self) -> Option<&Self::Error>;

    /// True iff the state holds a result and no error.
    fn has_loaded_successfully(&self) -> bool {
        self.provisioning_state() == ProvisioningState::Result && self.error().is_none()
    }

    /// The carried value, if this state's impulse is cache compatible with
    /// `load_impulse`. Never returns a value for an incompatible impulse,
    /// whatever the provisioning state.
    fn cache_compatible_value(&self, load_impulse: &ImpulseOf<Self>) -> Option<&Self::Value> {
        let own = self.load_impulse()?;
        if own.is_cache_compatible(load_impulse) {
            self.value()
        } else {
            None
        }
    }

    /// Success and error states end a load.
    fn is_end_state(&self) -> bool {
        self.provisioning_state() == ProvisioningState::Result
    }
}

// ============================================================================
// STATE
// ============================================================================

/// State of a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "case", rename_all = "snake_case")]
pub enum State<V, P, T, E> {
    /// No request made yet, or explicitly invalidated.
    NotReady,
    /// A request is in flight.
    Loading { load_impulse: LoadImpulse<P, T> },
    /// The request for `load_impulse` succeeded.
    Success {
        value: V,
        load_impulse: LoadImpulse<P, T>,
    },
    /// The request for `load_impulse` failed.
    Error {
        error: E,
        load_impulse: LoadImpulse<P, T>,
    },
}

impl<V, P, T, E> State<V, P, T, E> {
    pub fn loading(load_impulse: LoadImpulse<P, T>) -> Self {
        Self::Loading { load_impulse }
    }

    pub fn success(value: V, load_impulse: LoadImpulse<P, T>) -> Self {
        Self::Success {
            value,
            load_impulse,
        }
    }

    pub fn failure(error: E, load_impulse: LoadImpulse<P, T>) -> Self {
        Self::Error {
            error,
            load_impulse,
        }
    }
}

impl<V, P, T, E> DatasourceState for State<V, P, T, E>
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
        State::NotReady
    }

    fn from_error(error: E, load_impulse: LoadImpulse<P, T>) -> Self {
        State::Error {
            error,
            load_impulse,
        }
    }

    fn provisioning_state(&self) -> ProvisioningState {
        match self {
            State::NotReady => ProvisioningState::NotReady,
            State::Loading { .. } => ProvisioningState::Loading,
            State::Success { .. } | State::Error { .. } => ProvisioningState::Result,
        }
    }

    fn load_impulse(&self) -> Option<&LoadImpulse<P, T>> {
        match self {
            State::NotReady => None,
            State::Loading { load_impulse }
            | State::Success { load_impulse, .. }
            | State::Error { load_impulse, .. } => Some(load_impulse),
        }
    }

    fn value(&self) -> Option<&V> {
        match self {
            State::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    fn error(&self) -> Option<&E> {
        match self {
            State::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}
