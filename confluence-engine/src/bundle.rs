//! Ready-made cached datasource assembly.
//!
//! Most screens need the same graph: a recurring emitter, a primary
//! datasource that remembers its last result, a cache datasource replaying
//! a persister, and the cached datasource merging the two. The bundle
//! builds that graph around a caller-supplied primary datasource.

use std::sync::Arc;

use confluence_core::{
    CachedDatasourceError, CompositeOf, ConfluenceResult, Datasource, DatasourceConfig,
    DatasourceErrorType, DatasourceState, ImpulseOf, StateStream, TimerMode,
};
use confluence_storage::{InMemoryStatePersister, LmdbStatePersister, StatePersister};
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::cached::{CachedDatasource, DatasourceFor};
use crate::emitter::{LoadImpulseEmitter, RecurringLoadImpulseEmitter};
use crate::plain_cache::{EmitterFor, PersisterFor, PlainCacheDatasource};
use crate::retaining::DatasourceExt;

/// Recurring emitter, retaining primary, persister-backed cache and the
/// cached datasource merging them.
///
/// `S` is the state of the caller's primary datasource. The bundle exposes
/// composite states; its persister stores them as they are shown.
pub struct CachedDatasourceBundle<S: DatasourceState> {
    emitter: Arc<RecurringLoadImpulseEmitter<S::Params, S::ImpulseType>>,
    persister: Arc<PersisterFor<CompositeOf<S>>>,
    datasource: CachedDatasource<CompositeOf<S>>,
}

impl<S> CachedDatasourceBundle<S>
where
    S: DatasourceState,
    S::Error: CachedDatasourceError,
{
    /// Assemble the graph.
    ///
    /// `make_primary` receives the shared emitter and returns the primary
    /// datasource, which must react to the emitter's impulses. Cache misses
    /// surface as `S::Error::from_cache_load_error(DatasourceErrorType::Default)`.
    pub fn new<D, F>(
        initial: ImpulseOf<S>,
        timer_mode: TimerMode,
        persister: Arc<PersisterFor<CompositeOf<S>>>,
        make_primary: F,
    ) -> Self
    where
        D: Datasource<State = S> + 'static,
        F: FnOnce(Arc<EmitterFor<S>>) -> D,
    {
        let emitter = Arc::new(RecurringLoadImpulseEmitter::new(Some(initial), timer_mode));
        let shared: Arc<EmitterFor<S>> = emitter.clone();

        let primary: Arc<DatasourceFor<CompositeOf<S>>> =
            Arc::new(make_primary(Arc::clone(&shared)).retain_last_result());
        let cache: Arc<DatasourceFor<CompositeOf<S>>> =
            Arc::new(PlainCacheDatasource::<CompositeOf<S>>::new(
                Arc::clone(&shared),
                Arc::clone(&persister),
                S::Error::from_cache_load_error(DatasourceErrorType::Default),
            ));

        let datasource =
            CachedDatasource::new(shared, primary, cache, Some(Arc::clone(&persister)));

        Self {
            emitter,
            persister,
            datasource,
        }
    }

    /// Assemble the graph from configuration.
    ///
    /// Opens an LMDB persister when a persister section is configured and
    /// keeps states in memory otherwise.
    pub fn from_config<D, F>(
        config: &DatasourceConfig,
        initial: ImpulseOf<S>,
        make_primary: F,
    ) -> ConfluenceResult<Self>
    where
        D: Datasource<State = S> + 'static,
        F: FnOnce(Arc<EmitterFor<S>>) -> D,
        CompositeOf<S>: Serialize + DeserializeOwned,
    {
        config.validate()?;

        let persister: Arc<PersisterFor<CompositeOf<S>>> = match &config.persister {
            Some(persister_config) => {
                info!(
                    directory = %persister_config.directory.display(),
                    cache_key = %persister_config.cache_key,
                    "opening disk cache"
                );
                Arc::new(LmdbStatePersister::<CompositeOf<S>>::open(persister_config)?)
            }
            None => Arc::new(InMemoryStatePersister::<CompositeOf<S>>::new()),
        };

        Ok(Self::new(initial, config.timer_mode, persister, make_primary))
    }

    /// See [`CachedDatasource::load`].
    pub fn load(&self, load_impulse: ImpulseOf<S>) -> bool {
        self.datasource.load(load_impulse)
    }

    /// See [`CachedDatasource::load_deferred`].
    pub async fn load_deferred(&self, load_impulse: ImpulseOf<S>) -> CompositeOf<S> {
        self.datasource.load_deferred(load_impulse).await
    }

    /// Reload the current parameters for another reason, e.g. pull to refresh.
    ///
    /// Never skipped. Returns `false` only if nothing was ever requested.
    pub fn refresh(&self, impulse_type: S::ImpulseType) -> bool {
        match self.emitter.current() {
            Some(current) => self.datasource.load(
                current
                    .with_impulse_type(impulse_type)
                    .with_skip_if_result_available(false),
            ),
            None => false,
        }
    }

    pub fn timer_mode(&self) -> TimerMode {
        self.emitter.timer_mode()
    }

    pub fn set_timer_mode(&self, timer_mode: TimerMode) {
        self.emitter.set_timer_mode(timer_mode);
    }

    pub fn current_state(&self) -> CompositeOf<S> {
        self.datasource.current_state()
    }

    pub fn subscribe(&self) -> watch::Receiver<CompositeOf<S>> {
        self.datasource.subscribe()
    }

    pub fn loading_ended(&self) -> BoxStream<'static, ()> {
        self.datasource.loading_ended()
    }

    pub fn emitter(&self) -> &Arc<RecurringLoadImpulseEmitter<S::Params, S::ImpulseType>> {
        &self.emitter
    }

    pub fn persister(&self) -> &Arc<PersisterFor<CompositeOf<S>>> {
        &self.persister
    }

    pub fn datasource(&self) -> &CachedDatasource<CompositeOf<S>> {
        &self.datasource
    }

    /// Drop everything persisted for this bundle.
    pub async fn purge_cache(&self) -> ConfluenceResult<()> {
        self.persister.purge().await
    }
}

impl<S> Datasource for CachedDatasourceBundle<S>
where
    S: DatasourceState,
    S::Error: CachedDatasourceError,
{
    type State = CompositeOf<S>;

    fn state(&self) -> StateStream<Self::State> {
        self.datasource.state()
    }

    fn loads_synchronously(&self) -> bool {
        true
    }
}
