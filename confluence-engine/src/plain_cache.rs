//! Datasource that replays persisted states.

use std::sync::Arc;

use confluence_core::{Datasource, DatasourceState, StateStream};
use confluence_storage::StatePersister;
use futures_util::stream::StreamExt;
use tracing::{debug, warn};

use crate::combine::skip_repeats;
use crate::emitter::LoadImpulseEmitter;

/// Emitter trait object matching a state type.
pub type EmitterFor<S> = dyn LoadImpulseEmitter<
    Params = <S as DatasourceState>::Params,
    ImpulseType = <S as DatasourceState>::ImpulseType,
>;

/// Persister trait object for a state type.
pub type PersisterFor<S> = dyn StatePersister<State = S>;

/// Adapts a [`StatePersister`] into a [`Datasource`].
///
/// For every distinct load impulse the persister is asked for a compatible
/// state. A hit is emitted as is; a miss becomes an error state carrying
/// `cache_load_error` for that impulse. Persister failures are logged and
/// count as misses.
pub struct PlainCacheDatasource<S: DatasourceState> {
    emitter: Arc<EmitterFor<S>>,
    persister: Arc<PersisterFor<S>>,
    cache_load_error: S::Error,
}

impl<S: DatasourceState> PlainCacheDatasource<S> {
    pub fn new(
        emitter: Arc<EmitterFor<S>>,
        persister: Arc<PersisterFor<S>>,
        cache_load_error: S::Error,
    ) -> Self {
        Self {
            emitter,
            persister,
            cache_load_error,
        }
    }

    pub fn persister(&self) -> &Arc<PersisterFor<S>> {
        &self.persister
    }
}

impl<S: DatasourceState> Datasource for PlainCacheDatasource<S> {
    type State = S;

    fn state(&self) -> StateStream<S> {
        let persister = Arc::clone(&self.persister);
        let cache_load_error = self.cache_load_error.clone();

        skip_repeats(self.emitter.load_impulses())
            .then(move |load_impulse| {
                let persister = Arc::clone(&persister);
                let cache_load_error = cache_load_error.clone();
                async move {
                    let loaded = persister.load(load_impulse.parameters()).await;
                    match loaded {
                        Ok(Some(state)) => {
                            debug!(?load_impulse, "cache hit");
                            state
                        }
                        Ok(None) => {
                            debug!(?load_impulse, "cache miss");
                            S::from_error(cache_load_error, load_impulse)
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to load persisted state");
                            S::from_error(cache_load_error, load_impulse)
                        }
                    }
                }
            })
            .boxed()
    }

    /// States arrive only after the persister answered.
    fn loads_synchronously(&self) -> bool {
        false
    }
}
