//! Property-Based Tests for State Persisters
//!
//! Properties:
//! - decoding arbitrary bytes never panics
//! - a load never returns a state for incompatible parameters
//! - the LMDB and in-memory persisters agree on every load

use chrono::{TimeZone, Utc};
use confluence_core::{
    DatasourceError, DatasourceState, DefaultLoadImpulseType, LoadImpulse, Parameters, State,
};
use confluence_storage::{
    decode_record, encode_record, InMemoryStatePersister, LmdbStatePersister, StatePersister,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Filter {
    category: u8,
    page: u8,
}

impl Parameters for Filter {
    fn is_cache_compatible(&self, candidate: &Self) -> bool {
        self.category == candidate.category
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("code {0}")]
struct Code(u16);

impl DatasourceError for Code {}

type StoredState = State<Vec<u32>, Filter, DefaultLoadImpulseType, Code>;

// ============================================================================
// ARBITRATORS
// ============================================================================

fn arb_filter() -> impl Strategy<Value = Filter> + Clone {
    (0u8..3, 0u8..4).prop_map(|(category, page)| Filter { category, page })
}

fn arb_stored_state() -> impl Strategy<Value = StoredState> {
    let impulse = arb_filter().prop_map(LoadImpulse::<Filter, DefaultLoadImpulseType>::initial);
    prop_oneof![
        Just(StoredState::NotReady),
        impulse.clone().prop_map(StoredState::loading),
        (proptest::collection::vec(any::<u32>(), 0..8), impulse.clone())
            .prop_map(|(v, li)| StoredState::success(v, li)),
        (any::<u16>(), impulse).prop_map(|(e, li)| StoredState::failure(Code(e), li)),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime should build")
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: arbitrary bytes decode to an error or a record, never a panic
    #[test]
    fn prop_decode_is_total(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode_record::<StoredState>(&bytes);
    }

    /// Property: encode then decode restores state and millisecond timestamp
    #[test]
    fn prop_record_restores_state(state in arb_stored_state(), millis in 0i64..4_102_444_800_000) {
        let persisted_at = Utc.timestamp_millis_opt(millis).unwrap();
        let bytes = encode_record(&state, persisted_at).unwrap();
        let record = decode_record::<StoredState>(&bytes).unwrap();
        prop_assert_eq!(record.state, state);
        prop_assert_eq!(record.persisted_at, persisted_at);
    }

    /// Property: loads are filtered by compatibility and both persisters agree
    #[test]
    fn prop_load_is_compatible_and_consistent(
        state in arb_stored_state(),
        requested in arb_filter(),
    ) {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        let (lmdb, memory) = rt.block_on(async {
            let lmdb = LmdbStatePersister::<StoredState>::new(dir.path(), "prop", 10).unwrap();
            let memory = InMemoryStatePersister::<StoredState>::new();
            lmdb.persist(&state).await.unwrap();
            memory.persist(&state).await.unwrap();
            (
                lmdb.load(&requested).await.unwrap(),
                memory.load(&requested).await.unwrap(),
            )
        });

        if let Some(loaded) = &lmdb {
            let impulse = loaded.load_impulse().unwrap();
            prop_assert!(impulse.parameters().is_cache_compatible(&requested));
        }
        prop_assert_eq!(lmdb, memory);
    }
}
