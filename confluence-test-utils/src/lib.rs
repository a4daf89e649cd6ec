//! Confluence Test Utilities
//!
//! Centralized test infrastructure for the Confluence workspace:
//! - Controllable datasources and a recording persister
//! - Proptest generators for impulses and states
//! - Test fixtures for common scenarios
//! - Async wait helpers and custom assertions

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

// Re-export core types for convenience
pub use confluence_core::{
    CachedDatasourceError, CompositeOf, CompositeState, ConfluenceResult, Datasource,
    DatasourceError, DatasourceErrorType, DatasourceState, DefaultLoadImpulseType, LoadImpulse,
    LoadImpulseType, Parameters, PersistenceError, ProvisioningState, State, StateStream,
    StateValue,
};
pub use confluence_storage::{compatible_state, PersisterStats, StatePersister};

// ============================================================================
// TEST DOMAIN
// ============================================================================

/// Paged search parameters. Pages of the same query are cache compatible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestParams {
    pub query: String,
    pub page: u32,
}

impl TestParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 0,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

impl Parameters for TestParams {
    fn is_cache_compatible(&self, candidate: &Self) -> bool {
        self.query == candidate.query
    }
}

/// Source error used across the workspace tests.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TestError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("nothing cached ({0})")]
    CacheLoad(DatasourceErrorType),
}

impl DatasourceError for TestError {}

impl CachedDatasourceError for TestError {
    fn from_cache_load_error(error_type: DatasourceErrorType) -> Self {
        Self::CacheLoad(error_type)
    }
}

pub type TestValue = Vec<String>;
pub type TestImpulse = LoadImpulse<TestParams, DefaultLoadImpulseType>;
pub type TestState = State<TestValue, TestParams, DefaultLoadImpulseType, TestError>;
pub type TestComposite = CompositeOf<TestState>;

// ============================================================================
// CONTROLLABLE DATASOURCES
// ============================================================================

/// Datasource whose states are pushed by the test.
///
/// Created empty it does not emit on subscription, like a source that has
/// to do I/O first. Created with an initial state it is synchronous.
pub struct ManualDatasource<S> {
    sender: watch::Sender<Option<S>>,
    synchronous: bool,
}

impl<S: DatasourceState> ManualDatasource<S> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender,
            synchronous: false,
        }
    }

    pub fn with_initial(state: S) -> Self {
        let (sender, _) = watch::channel(Some(state));
        Self {
            sender,
            synchronous: true,
        }
    }

    /// Publish `state` to all subscribers.
    pub fn push(&self, state: S) {
        self.sender.send_replace(Some(state));
    }

    pub fn current(&self) -> Option<S> {
        self.sender.borrow().clone()
    }
}

impl<S: DatasourceState> Default for ManualDatasource<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DatasourceState> Datasource for ManualDatasource<S> {
    type State = S;

    fn state(&self) -> StateStream<S> {
        WatchStream::new(self.sender.subscribe())
            .filter_map(future::ready)
            .boxed()
    }

    fn loads_synchronously(&self) -> bool {
        self.synchronous
    }
}

type ImpulseSource<P, T> = Arc<dyn Fn() -> BoxStream<'static, LoadImpulse<P, T>> + Send + Sync>;
type FetchFn<V, P, T, E> =
    Arc<dyn Fn(LoadImpulse<P, T>) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

/// Primary datasource that fetches once per received impulse.
///
/// Emits `Loading` for the impulse, then `Success` or `Error` with the
/// fetch result. Impulses are processed one after another, so a result for
/// an old request can still arrive after a newer request was emitted.
pub struct FetchingDatasource<V, P, T, E> {
    impulses: ImpulseSource<P, T>,
    fetch: FetchFn<V, P, T, E>,
}

impl<V, P, T, E> FetchingDatasource<V, P, T, E>
where
    V: StateValue,
    P: Parameters,
    T: LoadImpulseType,
    E: DatasourceError,
{
    /// `impulses` subscribes to the load impulses, usually
    /// `move || emitter.load_impulses()`.
    pub fn new<I, F, Fut>(impulses: I, fetch: F) -> Self
    where
        I: Fn() -> BoxStream<'static, LoadImpulse<P, T>> + Send + Sync + 'static,
        F: Fn(LoadImpulse<P, T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            impulses: Arc::new(impulses),
            fetch: Arc::new(move |load_impulse| fetch(load_impulse).boxed()),
        }
    }
}

impl<V, P, T, E> Datasource for FetchingDatasource<V, P, T, E>
where
    V: StateValue,
    P: Parameters,
    T: LoadImpulseType,
    E: DatasourceError,
{
    type State = State<V, P, T, E>;

    fn state(&self) -> StateStream<Self::State> {
        let fetch = Arc::clone(&self.fetch);
        (self.impulses)()
            .flat_map(move |load_impulse| {
                let fetch = Arc::clone(&fetch);
                let loading = State::loading(load_impulse.clone());
                let result = async move {
                    match fetch(load_impulse.clone()).await {
                        Ok(value) => State::success(value, load_impulse),
                        Err(error) => State::failure(error, load_impulse),
                    }
                };
                stream::once(future::ready(loading)).chain(stream::once(result))
            })
            .boxed()
    }

    fn loads_synchronously(&self) -> bool {
        false
    }
}

/// Fetch results handed out in order, as the test provides them.
///
/// A fetch waits until the test calls [`ScriptedResults::resolve`].
pub struct ScriptedResults<V, E> {
    sender: mpsc::UnboundedSender<Result<V, E>>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Result<V, E>>>>,
}

impl<V, E> ScriptedResults<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Release the next pending fetch with `result`.
    pub fn resolve(&self, result: Result<V, E>) {
        // The receiver lives as long as `self`.
        let _ = self.sender.send(result);
    }

    /// Fetch function for [`FetchingDatasource::new`].
    pub fn fetcher<P, T>(
        &self,
    ) -> impl Fn(LoadImpulse<P, T>) -> BoxFuture<'static, Result<V, E>> + Send + Sync + 'static
    where
        P: Send + 'static,
        T: Send + 'static,
    {
        let receiver = Arc::clone(&self.receiver);
        move |_load_impulse: LoadImpulse<P, T>| {
            let receiver = Arc::clone(&receiver);
            async move {
                let next = receiver.lock().await.recv().await;
                match next {
                    Some(result) => result,
                    None => future::pending().await,
                }
            }
            .boxed()
        }
    }
}

impl<V, E> Default for ScriptedResults<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RECORDING PERSISTER
// ============================================================================

/// Persister that records every write and can be switched to fail.
pub struct RecordingPersister<S> {
    persisted: Mutex<Vec<S>>,
    stored: RwLock<Option<S>>,
    failing: AtomicBool,
    loads: AtomicU64,
    hits: AtomicU64,
    purges: AtomicU64,
}

impl<S: DatasourceState> RecordingPersister<S> {
    pub fn new() -> Self {
        Self {
            persisted: Mutex::new(Vec::new()),
            stored: RwLock::new(None),
            failing: AtomicBool::new(false),
            loads: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            purges: AtomicU64::new(0),
        }
    }

    /// Persister that already holds `state`. The seed is not recorded.
    pub fn with_state(state: S) -> Self {
        Self {
            stored: RwLock::new(Some(state)),
            ..Self::new()
        }
    }

    /// Make every following call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every state written so far, in order.
    pub async fn persisted(&self) -> Vec<S> {
        self.persisted.lock().await.clone()
    }

    pub async fn persist_count(&self) -> usize {
        self.persisted.lock().await.len()
    }

    fn check_failing(&self) -> ConfluenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                reason: "recording persister set to fail".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl<S: DatasourceState> Default for RecordingPersister<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: DatasourceState> StatePersister for RecordingPersister<S> {
    type State = S;

    async fn persist(&self, state: &S) -> ConfluenceResult<()> {
        self.check_failing()?;
        debug!(?state, "recording persisted state");
        self.persisted.lock().await.push(state.clone());
        *self.stored.write().await = Some(state.clone());
        Ok(())
    }

    async fn load(&self, parameters: &S::Params) -> ConfluenceResult<Option<S>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.check_failing()?;
        let stored = self.stored.read().await.clone();
        let state = stored.and_then(|state| compatible_state(state, parameters));
        if state.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Ok(state)
    }

    async fn purge(&self) -> ConfluenceResult<()> {
        self.purges.fetch_add(1, Ordering::Relaxed);
        self.check_failing()?;
        *self.stored.write().await = None;
        Ok(())
    }

    async fn stats(&self) -> PersisterStats {
        let loads = self.loads.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        PersisterStats {
            persists: self.persisted.lock().await.len() as u64,
            loads,
            hits,
            misses: loads - hits,
            purges: self.purges.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// ASYNC HELPERS
// ============================================================================

/// How long wait helpers wait before failing the test.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Wait until the watched state satisfies `predicate` and return it.
///
/// Checks the current state first. Panics after [`DEFAULT_WAIT`].
pub async fn wait_for_state<S, F>(updates: &mut watch::Receiver<S>, predicate: F) -> S
where
    S: Clone + std::fmt::Debug,
    F: Fn(&S) -> bool,
{
    let waited = tokio::time::timeout(DEFAULT_WAIT, async {
        loop {
            {
                let current = updates.borrow_and_update();
                if predicate(&current) {
                    return Some(current.clone());
                }
            }
            if updates.changed().await.is_err() {
                return None;
            }
        }
    })
    .await;

    match waited {
        Ok(Some(state)) => state,
        Ok(None) => panic!("state sender dropped before the expected state arrived"),
        Err(_) => panic!(
            "timed out waiting for state; last state: {:?}",
            *updates.borrow()
        ),
    }
}

/// Wait until `condition` holds. Panics after [`DEFAULT_WAIT`].
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(DEFAULT_WAIT, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for condition");
}

/// Install a fmt subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Generate parameters from a small query space so collisions happen.
    pub fn arb_params() -> impl Strategy<Value = TestParams> {
        ("[a-c]", 0u32..3).prop_map(|(query, page)| TestParams { query, page })
    }

    pub fn arb_impulse_type() -> impl Strategy<Value = DefaultLoadImpulseType> {
        prop_oneof![
            Just(DefaultLoadImpulseType::Initial),
            Just(DefaultLoadImpulseType::PullToRefresh),
        ]
    }

    pub fn arb_impulse() -> impl Strategy<Value = TestImpulse> {
        (arb_params(), arb_impulse_type(), any::<bool>()).prop_map(
            |(parameters, impulse_type, skip)| {
                LoadImpulse::new(parameters, impulse_type).with_skip_if_result_available(skip)
            },
        )
    }

    pub fn arb_value() -> impl Strategy<Value = TestValue> {
        prop::collection::vec("[a-z]{1,4}", 0..3)
    }

    pub fn arb_error() -> impl Strategy<Value = TestError> {
        prop_oneof![
            "[a-z]{1,6}".prop_map(TestError::Network),
            Just(TestError::CacheLoad(DatasourceErrorType::Default)),
        ]
    }

    pub fn arb_state() -> impl Strategy<Value = TestState> {
        prop_oneof![
            Just(TestState::NotReady),
            arb_impulse().prop_map(TestState::loading),
            (arb_value(), arb_impulse())
                .prop_map(|(value, impulse)| TestState::success(value, impulse)),
            (arb_error(), arb_impulse())
                .prop_map(|(error, impulse)| TestState::failure(error, impulse)),
        ]
    }

    pub fn arb_composite() -> impl Strategy<Value = TestComposite> {
        prop_oneof![
            Just(TestComposite::NotReady),
            (
                prop::option::of(arb_value()),
                prop::option::of(arb_error()),
                arb_impulse()
            )
                .prop_map(|(fallback_value, fallback_error, load_impulse)| {
                    TestComposite::Loading {
                        fallback_value,
                        fallback_error,
                        load_impulse,
                    }
                }),
            (arb_value(), arb_impulse()).prop_map(|(value, load_impulse)| {
                TestComposite::Success {
                    value,
                    load_impulse,
                }
            }),
            (arb_error(), prop::option::of(arb_value()), arb_impulse()).prop_map(
                |(error, fallback_value, load_impulse)| TestComposite::Error {
                    error,
                    fallback_value,
                    load_impulse,
                }
            ),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    pub fn params(query: &str) -> TestParams {
        TestParams::new(query)
    }

    /// Initial load of the first page of `query`.
    pub fn impulse(query: &str) -> TestImpulse {
        LoadImpulse::initial(params(query))
    }

    pub fn refresh_impulse(query: &str) -> TestImpulse {
        LoadImpulse::new(params(query), DefaultLoadImpulseType::PullToRefresh)
    }

    pub fn value(items: &[&str]) -> TestValue {
        items.iter().map(|item| item.to_string()).collect()
    }

    pub fn success(items: &[&str], query: &str) -> TestState {
        TestState::success(value(items), impulse(query))
    }

    pub fn network_error(reason: &str) -> TestError {
        TestError::Network(reason.to_string())
    }

    pub fn cache_miss() -> TestError {
        TestError::from_cache_load_error(DatasourceErrorType::Default)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;

    /// Assert that `state` is not ready.
    pub fn assert_not_ready<S: DatasourceState>(state: &S) {
        assert_eq!(
            state.provisioning_state(),
            ProvisioningState::NotReady,
            "expected NotReady, got {state:?}"
        );
    }

    /// Assert that `state` shows `expected`, as success or as fallback.
    pub fn assert_shows<S: DatasourceState>(state: &S, expected: &S::Value) {
        assert_eq!(state.value(), Some(expected), "unexpected value in {state:?}");
    }

    /// Assert that `state` belongs to `load_impulse`.
    pub fn assert_for_impulse<S: DatasourceState>(
        state: &S,
        load_impulse: &LoadImpulse<S::Params, S::ImpulseType>,
    ) {
        assert_eq!(
            state.load_impulse(),
            Some(load_impulse),
            "state {state:?} belongs to another request"
        );
    }
}
