//! Request parameters, load impulse types and value markers.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Describes *what* was requested.
///
/// `is_cache_compatible` answers "may a value fetched for `self` be shown
/// when the current request is `candidate`?". The default is structural
/// equality; paginated or filtered requests typically relax it to compare
/// only the filter and sort key.
pub trait Parameters: Clone + PartialEq + Debug + Send + Sync + 'static {
    fn is_cache_compatible(&self, candidate: &Self) -> bool {
        self == candidate
    }
}

impl Parameters for String {}

impl Parameters for () {}

/// Parameters for requests that take no input.
///
/// Every value is compatible with every other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VoidParameters;

impl Parameters for VoidParameters {
    fn is_cache_compatible(&self, _candidate: &Self) -> bool {
        true
    }
}

/// Describes *why* a load was requested.
pub trait LoadImpulseType: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Impulse type used to seed emitters.
    fn initial_value() -> Self;
}

/// Reasons for loading used by most list screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultLoadImpulseType {
    /// First load when a consumer appears.
    #[default]
    Initial,
    /// User asked for fresh data.
    PullToRefresh,
}

impl LoadImpulseType for DefaultLoadImpulseType {
    fn initial_value() -> Self {
        Self::Initial
    }
}

/// Values carried by states.
pub trait StateValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}
