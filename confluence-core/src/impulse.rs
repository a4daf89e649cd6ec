//! Load impulses: the reified identity of one load request.

use serde::{Deserialize, Serialize};

use crate::parameters::{LoadImpulseType, Parameters};

/// One load request: parameters, reason and skip policy.
///
/// Impulses are immutable; [`LoadImpulse::with_parameters`] returns a
/// modified copy. Equality is structural, so re-emitting an identical
/// impulse is recognizable as a repeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadImpulse<P, T> {
    parameters: P,
    impulse_type: T,
    #[serde(default)]
    skip_if_result_available: bool,
}

impl<P: Parameters, T: LoadImpulseType> LoadImpulse<P, T> {
    pub fn new(parameters: P, impulse_type: T) -> Self {
        Self {
            parameters,
            impulse_type,
            skip_if_result_available: false,
        }
    }

    /// Impulse with the impulse type's initial value.
    pub fn initial(parameters: P) -> Self {
        Self::new(parameters, T::initial_value())
    }

    /// Set whether the load should be skipped when a result is already shown.
    pub fn with_skip_if_result_available(mut self, skip: bool) -> Self {
        self.skip_if_result_available = skip;
        self
    }

    /// Copy of this impulse targeting other parameters.
    pub fn with_parameters(&self, parameters: P) -> Self {
        Self {
            parameters,
            impulse_type: self.impulse_type.clone(),
            skip_if_result_available: self.skip_if_result_available,
        }
    }

    /// Copy of this impulse with another reason.
    pub fn with_impulse_type(&self, impulse_type: T) -> Self {
        Self {
            parameters: self.parameters.clone(),
            impulse_type,
            skip_if_result_available: self.skip_if_result_available,
        }
    }

    pub fn parameters(&self) -> &P {
        &self.parameters
    }

    pub fn impulse_type(&self) -> &T {
        &self.impulse_type
    }

    pub fn skip_if_result_available(&self) -> bool {
        self.skip_if_result_available
    }

    /// Two impulses are cache compatible iff their parameters are.
    ///
    /// `self` is the impulse that produced a stored value, `candidate`
    /// the impulse that wants to display it.
    pub fn is_cache_compatible(&self, candidate: &Self) -> bool {
        self.parameters.is_cache_compatible(&candidate.parameters)
    }
}
