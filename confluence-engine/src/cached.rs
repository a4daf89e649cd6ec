//! The cached datasource: merges a primary source with a cache source.

use std::sync::Arc;

use confluence_core::{
    reconcile, CompositeOf, CompositeState, Datasource, DatasourceState, ImpulseOf,
    Reconciliation, StateStream,
};
use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::combine::{combine_latest3, skip_repeats};
use crate::plain_cache::{EmitterFor, PersisterFor};
use crate::property::StateProperty;

/// Primary or cache datasource trait object.
pub type DatasourceFor<S> = dyn Datasource<State = S>;

/// Reconciles a primary datasource with a cache datasource.
///
/// The latest primary state, the latest cache state and the latest
/// distinct load impulse are merged with [`reconcile`] whenever any of them
/// changes. The merged stream starts at `NotReady` and never repeats a
/// state.
///
/// Every primary transition into a fresh success is handed to the
/// persister, if one is configured, even when the value is unchanged.
/// Writes happen on a background task in the order they were decided and
/// never delay the merged state; failures are logged and dropped.
///
/// Construction spawns the merge task and requires a tokio runtime.
pub struct CachedDatasource<S: DatasourceState> {
    emitter: Arc<EmitterFor<S>>,
    property: StateProperty<CompositeOf<S>>,
}

impl<S: DatasourceState> CachedDatasource<S> {
    pub fn new(
        emitter: Arc<EmitterFor<S>>,
        primary: Arc<DatasourceFor<S>>,
        cache: Arc<DatasourceFor<S>>,
        persister: Option<Arc<PersisterFor<S>>>,
    ) -> Self {
        let persist_queue = persister.map(spawn_persist_worker);

        let merged = combine_latest3(
            primary.state_with_synchronous_initial(),
            cache.state_with_synchronous_initial(),
            skip_repeats(emitter.load_impulses()).boxed(),
        )
        .scan(
            None,
            move |previous_primary: &mut Option<S>, (primary, cache, load_impulse)| {
                let Reconciliation {
                    state,
                    should_persist,
                } = reconcile(&primary, &cache, &load_impulse);

                // Cache and impulse changes alone never write back.
                if should_persist && previous_primary.as_ref() != Some(&primary) {
                    if let Some(queue) = &persist_queue {
                        debug!(?load_impulse, "persisting primary result");
                        if queue.send(primary.clone()).is_err() {
                            warn!("persist worker stopped, dropping primary result");
                        }
                    }
                }
                *previous_primary = Some(primary);

                debug!(?state, "merged state");
                future::ready(Some(state))
            },
        );

        Self {
            emitter,
            property: StateProperty::new(CompositeState::NotReady, merged),
        }
    }

    /// Request a load.
    ///
    /// Returns `false` without emitting when the impulse asks to skip and
    /// a successful result is already shown.
    pub fn load(&self, load_impulse: ImpulseOf<S>) -> bool {
        if load_impulse.skip_if_result_available()
            && self
                .property
                .with_value(|state| state.has_loaded_successfully())
        {
            debug!(?load_impulse, "result available, skipping load");
            return false;
        }

        self.emitter.emit(load_impulse);
        true
    }

    /// Request a load and wait for the next end state.
    ///
    /// Resolves to the current state at once when the load was skipped.
    pub async fn load_deferred(&self, load_impulse: ImpulseOf<S>) -> CompositeOf<S> {
        let mut updates = self.property.subscribe();
        if !self.load(load_impulse) {
            return self.property.value();
        }

        loop {
            if updates.changed().await.is_err() {
                return updates.borrow().clone();
            }
            let state = updates.borrow_and_update().clone();
            if state.is_end_state() {
                return state;
            }
        }
    }

    /// Fires whenever a new success or error state is reached.
    pub fn loading_ended(&self) -> BoxStream<'static, ()> {
        self.property
            .changes()
            .filter(|state| future::ready(state.is_end_state()))
            .map(|_| ())
            .boxed()
    }

    pub fn current_state(&self) -> CompositeOf<S> {
        self.property.value()
    }

    /// Receiver positioned at the current merged state.
    pub fn subscribe(&self) -> watch::Receiver<CompositeOf<S>> {
        self.property.subscribe()
    }

    pub fn emitter(&self) -> &Arc<EmitterFor<S>> {
        &self.emitter
    }
}

fn spawn_persist_worker<S: DatasourceState>(
    persister: Arc<PersisterFor<S>>,
) -> mpsc::UnboundedSender<S> {
    let (queue, mut pending) = mpsc::unbounded_channel::<S>();
    tokio::spawn(async move {
        while let Some(state) = pending.recv().await {
            if let Err(e) = persister.persist(&state).await {
                warn!(error = %e, "failed to persist state");
            }
        }
    });
    queue
}

impl<S: DatasourceState> Datasource for CachedDatasource<S> {
    type State = CompositeOf<S>;

    fn state(&self) -> StateStream<Self::State> {
        self.property.stream()
    }

    fn loads_synchronously(&self) -> bool {
        true
    }
}
