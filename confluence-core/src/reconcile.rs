//! Reconciliation rules.
//!
//! Every merge in the engine goes through [`resolve_with_fallback`]: the
//! primary/cache merge of a cached datasource and the latest/last-result
//! merge of a retaining datasource differ only in what they pass as the
//! fallback source. Precedence is always current source, then fallback
//! source, then nothing. The current source wins ties.
//!
//! These functions are pure and total. Deciding whether to persist is kept
//! apart from computing the next state so both can be tested without a
//! persister.

use crate::composite::{CompositeOf, CompositeState};
use crate::state::{DatasourceState, ImpulseOf, ProvisioningState};

/// Outcome of one primary/cache merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<S: DatasourceState> {
    /// Next merged state.
    pub state: CompositeOf<S>,
    /// Whether the primary state should be written to the persister.
    pub should_persist: bool,
}

/// Error carried by `state`, if the state belongs to a request compatible
/// with `load_impulse`.
fn compatible_error<'a, S: DatasourceState>(
    state: &'a S,
    load_impulse: &ImpulseOf<S>,
) -> Option<&'a S::Error> {
    let own = state.load_impulse()?;
    if own.is_cache_compatible(load_impulse) {
        state.error()
    } else {
        None
    }
}

/// Merge `current` with `fallback` for the request `load_impulse`.
///
/// While `current` is not ready or loading, the first compatible value of
/// `current` then `fallback` becomes the loading fallback. Once `current`
/// has a result, its compatible value is authoritative; a compatible error
/// is shown beside the fallback's compatible value. A result that belongs
/// to an incompatible request resolves to `NotReady` so stale content is
/// purged rather than shown for the wrong request.
pub fn resolve_with_fallback<S: DatasourceState>(
    current: &S,
    fallback: Option<&S>,
    load_impulse: &ImpulseOf<S>,
) -> CompositeOf<S> {
    match current.provisioning_state() {
        ProvisioningState::NotReady | ProvisioningState::Loading => {
            if let Some(value) = current.cache_compatible_value(load_impulse) {
                return CompositeState::Loading {
                    fallback_value: Some(value.clone()),
                    fallback_error: compatible_error(current, load_impulse).cloned(),
                    load_impulse: load_impulse.clone(),
                };
            }

            if let Some(fallback) = fallback {
                if let Some(value) = fallback.cache_compatible_value(load_impulse) {
                    return CompositeState::Loading {
                        fallback_value: Some(value.clone()),
                        fallback_error: compatible_error(fallback, load_impulse).cloned(),
                        load_impulse: load_impulse.clone(),
                    };
                }
            }

            if current.provisioning_state() == ProvisioningState::Loading {
                CompositeState::Loading {
                    fallback_value: None,
                    fallback_error: compatible_error(current, load_impulse).cloned(),
                    load_impulse: load_impulse.clone(),
                }
            } else {
                CompositeState::NotReady
            }
        }
        ProvisioningState::Result => {
            if let Some(value) = current.cache_compatible_value(load_impulse) {
                return match current.error() {
                    Some(error) => CompositeState::Error {
                        error: error.clone(),
                        fallback_value: Some(value.clone()),
                        load_impulse: load_impulse.clone(),
                    },
                    None => CompositeState::Success {
                        value: value.clone(),
                        load_impulse: load_impulse.clone(),
                    },
                };
            }

            match compatible_error(current, load_impulse) {
                Some(error) => CompositeState::Error {
                    error: error.clone(),
                    fallback_value: fallback
                        .and_then(|fallback| fallback.cache_compatible_value(load_impulse))
                        .cloned(),
                    load_impulse: load_impulse.clone(),
                },
                // Result for a superseded request.
                None => CompositeState::NotReady,
            }
        }
    }
}

/// Whether `primary` is a fresh success for `load_impulse`.
///
/// Only confirmed primary successes are written back. Loading, not-ready,
/// error and fallback-carrying states never are.
pub fn should_persist<S: DatasourceState>(primary: &S, load_impulse: &ImpulseOf<S>) -> bool {
    primary.has_loaded_successfully() && primary.cache_compatible_value(load_impulse).is_some()
}

/// Merge a primary state with a cache state.
pub fn reconcile<S: DatasourceState>(
    primary: &S,
    cache: &S,
    load_impulse: &ImpulseOf<S>,
) -> Reconciliation<S> {
    Reconciliation {
        state: resolve_with_fallback(primary, Some(cache), load_impulse),
        should_persist: should_persist(primary, load_impulse),
    }
}

/// Merge the latest state of a source with its last result.
///
/// The target request is the latest state's own impulse, so a
/// `NotReady` latest state stays `NotReady`.
pub fn retain_last_result<S: DatasourceState>(
    latest: &S,
    last_result: Option<&S>,
) -> CompositeOf<S> {
    match latest.load_impulse() {
        Some(load_impulse) => resolve_with_fallback(latest, last_result, load_impulse),
        None => CompositeState::NotReady,
    }
}
