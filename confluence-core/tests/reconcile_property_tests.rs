//! Property-Based Tests for Reconciliation
//!
//! Properties:
//! - a value is never read through an incompatible impulse
//! - a primary value always wins over a cache value while loading
//! - a result for a superseded request never reaches the merged state
//! - only fresh primary successes are persisted
//! - every fallback value comes from a compatible source

use confluence_core::{
    reconcile, retain_last_result, CompositeState, DatasourceError, DatasourceState,
    DefaultLoadImpulseType, LoadImpulse, Parameters, ProvisioningState, State,
};
use proptest::prelude::*;
use thiserror::Error;

// ============================================================================
// TEST TYPES
// ============================================================================

/// Paged query. Pages of the same query are cache compatible.
#[derive(Debug, Clone, PartialEq)]
struct Query {
    term: String,
    page: u8,
}

impl Parameters for Query {
    fn is_cache_compatible(&self, candidate: &Self) -> bool {
        self.term == candidate.term
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("failure {0}")]
struct Failure(u8);

impl DatasourceError for Failure {}

type Impulse = LoadImpulse<Query, DefaultLoadImpulseType>;
type PropState = State<u32, Query, DefaultLoadImpulseType, Failure>;
type PropComposite = CompositeState<u32, Query, DefaultLoadImpulseType, Failure>;

// ============================================================================
// ARBITRATORS
// ============================================================================

fn arb_impulse() -> impl Strategy<Value = Impulse> {
    (
        prop_oneof![Just("a"), Just("b"), Just("c")],
        0u8..3,
        prop_oneof![
            Just(DefaultLoadImpulseType::Initial),
            Just(DefaultLoadImpulseType::PullToRefresh),
        ],
        any::<bool>(),
    )
        .prop_map(|(term, page, impulse_type, skip)| {
            LoadImpulse::new(
                Query {
                    term: term.to_string(),
                    page,
                },
                impulse_type,
            )
            .with_skip_if_result_available(skip)
        })
}

fn arb_state() -> impl Strategy<Value = PropState> {
    prop_oneof![
        Just(PropState::NotReady),
        arb_impulse().prop_map(PropState::loading),
        (any::<u32>(), arb_impulse()).prop_map(|(v, li)| PropState::success(v, li)),
        (any::<u8>(), arb_impulse()).prop_map(|(e, li)| PropState::failure(Failure(e), li)),
    ]
}

fn arb_composite() -> impl Strategy<Value = PropComposite> {
    prop_oneof![
        Just(PropComposite::NotReady),
        (
            proptest::option::of(any::<u32>()),
            proptest::option::of(any::<u8>()),
            arb_impulse()
        )
            .prop_map(|(v, e, li)| PropComposite::Loading {
                fallback_value: v,
                fallback_error: e.map(Failure),
                load_impulse: li,
            }),
        (any::<u32>(), arb_impulse()).prop_map(|(v, li)| PropComposite::Success {
            value: v,
            load_impulse: li,
        }),
        (any::<u8>(), proptest::option::of(any::<u32>()), arb_impulse()).prop_map(
            |(e, v, li)| PropComposite::Error {
                error: Failure(e),
                fallback_value: v,
                load_impulse: li,
            }
        ),
    ]
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: incompatible impulses never expose a value
    #[test]
    fn prop_cache_compatible_value_gated(state in arb_composite(), query in arb_impulse()) {
        let compatible = state
            .load_impulse()
            .map(|own| own.is_cache_compatible(&query))
            .unwrap_or(false);
        if !compatible {
            prop_assert!(state.cache_compatible_value(&query).is_none());
        }
    }

    /// Property: while the primary is loading, its own compatible value wins
    #[test]
    fn prop_primary_fallback_precedence(
        primary in arb_composite(),
        cache in arb_composite(),
        current in arb_impulse(),
    ) {
        prop_assume!(primary.provisioning_state() == ProvisioningState::Loading);
        let merged = reconcile(&primary, &cache, &current).state;

        if let Some(value) = primary.cache_compatible_value(&current) {
            prop_assert_eq!(merged.fallback_value(), Some(value));
        }
    }

    /// Property: a result for an incompatible request resolves to NotReady
    #[test]
    fn prop_superseded_result_is_purged(
        primary in arb_state(),
        cache in arb_state(),
        current in arb_impulse(),
    ) {
        prop_assume!(primary.provisioning_state() == ProvisioningState::Result);
        let superseded = primary
            .load_impulse()
            .map(|own| !own.is_cache_compatible(&current))
            .unwrap_or(false);
        prop_assume!(superseded);

        let merged = reconcile(&primary, &cache, &current);
        prop_assert_eq!(merged.state, PropComposite::NotReady);
        prop_assert!(!merged.should_persist);
    }

    /// Property: persist iff the primary is a compatible success
    #[test]
    fn prop_persist_only_fresh_success(
        primary in arb_composite(),
        cache in arb_composite(),
        current in arb_impulse(),
    ) {
        let merged = reconcile(&primary, &cache, &current);
        let expected = matches!(primary, PropComposite::Success { ref load_impulse, .. }
            if load_impulse.is_cache_compatible(&current));
        prop_assert_eq!(merged.should_persist, expected);
    }

    /// Property: fallback values come from a compatible primary or cache
    #[test]
    fn prop_fallback_has_compatible_origin(
        primary in arb_state(),
        cache in arb_state(),
        current in arb_impulse(),
    ) {
        let merged = reconcile(&primary, &cache, &current).state;
        if let Some(fallback) = merged.fallback_value() {
            let from_primary = primary.cache_compatible_value(&current) == Some(fallback);
            let from_cache = cache.cache_compatible_value(&current) == Some(fallback);
            prop_assert!(from_primary || from_cache);
        }
    }

    /// Property: merged states always carry the current impulse
    #[test]
    fn prop_merged_state_tracks_current_impulse(
        primary in arb_state(),
        cache in arb_state(),
        current in arb_impulse(),
    ) {
        let merged = reconcile(&primary, &cache, &current).state;
        if let Some(load_impulse) = merged.load_impulse() {
            prop_assert_eq!(load_impulse, &current);
        }
    }

    /// Property: retention never invents a request
    #[test]
    fn prop_retain_follows_latest_impulse(
        latest in arb_state(),
        last in proptest::option::of(arb_state()),
    ) {
        let merged = retain_last_result(&latest, last.as_ref());
        prop_assert_eq!(merged.load_impulse(), latest.load_impulse());
    }
}
