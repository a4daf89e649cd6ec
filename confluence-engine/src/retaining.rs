//! Datasource decorator that remembers its last result.

use std::sync::Arc;

use confluence_core::{
    retain_last_result, CompositeOf, Datasource, DatasourceState, StateStream,
};
use futures_util::stream::StreamExt;
use tokio::sync::watch;

/// Wraps a datasource so its loading and error states carry the last
/// compatible result as fallback.
///
/// The merge is the same one a [`crate::CachedDatasource`] applies to its
/// primary and cache sources, with the inner datasource's own history in
/// place of the cache.
///
/// The last result is replaced by every end state that carries a value.
/// An end state without a value (a bare error) replaces it only when the
/// retained value does not fit the new request, so one failed refresh does
/// not drop the value that is still worth showing.
///
/// The last result is owned by the decorator, not by a subscription, so a
/// late subscriber starts with the history earlier subscribers built up.
pub struct LastResultRetainingDatasource<D: Datasource> {
    inner: D,
    last_result: Arc<watch::Sender<Option<D::State>>>,
}

impl<D: Datasource> LastResultRetainingDatasource<D> {
    pub fn new(inner: D) -> Self {
        let (last_result, _) = watch::channel(None);
        Self {
            inner,
            last_result: Arc::new(last_result),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

fn should_retain<S: DatasourceState>(latest: &S, last_result: Option<&S>) -> bool {
    if !latest.is_end_state() {
        return false;
    }
    if latest.value().is_some() {
        return true;
    }
    match (last_result, latest.load_impulse()) {
        (Some(last_result), Some(load_impulse)) => {
            last_result.cache_compatible_value(load_impulse).is_none()
        }
        _ => true,
    }
}

impl<D: Datasource> Datasource for LastResultRetainingDatasource<D> {
    type State = CompositeOf<D::State>;

    fn state(&self) -> StateStream<Self::State> {
        let last_result = Arc::clone(&self.last_result);
        self.inner
            .state_with_synchronous_initial()
            .map(move |latest| {
                let (merged, retain) = {
                    let last = last_result.borrow();
                    (
                        retain_last_result(&latest, last.as_ref()),
                        should_retain(&latest, last.as_ref()),
                    )
                };
                if retain {
                    last_result.send_replace(Some(latest));
                }
                merged
            })
            .boxed()
    }

    /// A leading `NotReady` is inserted for asynchronous inner sources.
    fn loads_synchronously(&self) -> bool {
        true
    }
}

/// Combinators available on every [`Datasource`].
pub trait DatasourceExt: Datasource + Sized {
    /// Wrap in a [`LastResultRetainingDatasource`].
    fn retain_last_result(self) -> LastResultRetainingDatasource<Self> {
        LastResultRetainingDatasource::new(self)
    }
}

impl<D: Datasource> DatasourceExt for D {}
