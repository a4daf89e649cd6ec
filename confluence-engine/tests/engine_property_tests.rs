//! Property-based tests for the live merge engine.
//!
//! The engine must settle on exactly the state the pure merge rules compute
//! for its latest inputs, and must honor the skip flag of load requests.

use std::sync::Arc;
use std::time::Duration;

use confluence_core::{reconcile, should_persist};
use confluence_engine::{
    CachedDatasource, DatasourceState, DefaultLoadImpulseEmitter, LoadImpulseEmitter, PersisterFor,
};
use confluence_test_utils::generators::*;
use confluence_test_utils::*;
use proptest::prelude::*;

type Emitter = DefaultLoadImpulseEmitter<TestParams, DefaultLoadImpulseType>;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime should build")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The engine settles on the pure merge of its latest inputs.
    #[test]
    fn prop_engine_settles_on_reconciled_state(
        primary in arb_state(),
        cache in arb_state(),
        load_impulse in arb_impulse(),
    ) {
        let expected = reconcile(&primary, &cache, &load_impulse).state;

        let settled = runtime().block_on(async {
            let emitter = Arc::new(Emitter::with_initial(load_impulse.clone()));
            let datasource = CachedDatasource::<TestState>::new(
                emitter,
                Arc::new(ManualDatasource::with_initial(primary.clone())),
                Arc::new(ManualDatasource::with_initial(cache.clone())),
                None,
            );
            let mut updates = datasource.subscribe();
            wait_for_state(&mut updates, |s| *s == expected).await
        });

        prop_assert_eq!(settled, expected);
    }

    /// Exactly the fresh primary successes reach the persister.
    #[test]
    fn prop_engine_persists_only_fresh_successes(
        primary in arb_state(),
        load_impulse in arb_impulse(),
    ) {
        let persisted = runtime().block_on(async {
            let emitter = Arc::new(Emitter::with_initial(load_impulse.clone()));
            let persister = Arc::new(RecordingPersister::<TestState>::new());
            let datasource = CachedDatasource::<TestState>::new(
                emitter,
                Arc::new(ManualDatasource::with_initial(primary.clone())),
                Arc::new(ManualDatasource::with_initial(TestState::NotReady)),
                Some(persister.clone() as Arc<PersisterFor<TestState>>),
            );
            let expected = reconcile(&primary, &TestState::NotReady, &load_impulse).state;
            let mut updates = datasource.subscribe();
            wait_for_state(&mut updates, |s| *s == expected).await;
            if should_persist(&primary, &load_impulse) {
                let recorder = persister.clone();
                wait_until(|| {
                    let recorder = recorder.clone();
                    async move { recorder.persist_count().await >= 1 }
                })
                .await;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            persister.persisted().await
        });

        if should_persist(&primary, &load_impulse) {
            prop_assert_eq!(persisted, vec![primary]);
        } else {
            prop_assert!(persisted.is_empty());
        }
    }

    /// A skippable request never reaches the emitter once a success is shown.
    #[test]
    fn prop_skippable_load_is_refused_after_success(
        value in arb_value(),
        first in arb_impulse(),
        second in arb_impulse(),
    ) {
        let first = first.with_skip_if_result_available(false);
        let second = second.with_skip_if_result_available(true);

        let (started, current) = runtime().block_on(async {
            let emitter = Arc::new(Emitter::with_initial(first.clone()));
            let datasource = CachedDatasource::<TestState>::new(
                emitter.clone(),
                Arc::new(ManualDatasource::with_initial(TestState::success(
                    value,
                    first.clone(),
                ))),
                Arc::new(ManualDatasource::with_initial(TestState::NotReady)),
                None,
            );
            let mut updates = datasource.subscribe();
            wait_for_state(&mut updates, |s| s.has_loaded_successfully()).await;
            let started = datasource.load(second.clone());
            (started, emitter.current())
        });

        prop_assert!(!started);
        prop_assert_eq!(current, Some(first));
    }
}
