//! State persister contract and shared bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use confluence_core::{ConfluenceResult, DatasourceState, Parameters};

/// Stores one state per persister so a cache datasource can replay it.
///
/// Persistence is an optimization: callers treat every error as "nothing
/// stored" and carry on.
///
/// # Compatibility filtering
///
/// [`StatePersister::load`] returns `None` both when nothing is stored and
/// when the stored state was produced for parameters that are not cache
/// compatible with the requested ones. Callers never filter themselves.
#[async_trait]
pub trait StatePersister: Send + Sync {
    type State: DatasourceState;

    /// Store `state`, replacing whatever was stored. Last write wins.
    async fn persist(&self, state: &Self::State) -> ConfluenceResult<()>;

    /// Load the stored state if it is cache compatible with `parameters`.
    async fn load(
        &self,
        parameters: &<Self::State as DatasourceState>::Params,
    ) -> ConfluenceResult<Option<Self::State>>;

    /// Remove the stored state.
    async fn purge(&self) -> ConfluenceResult<()>;

    /// Usage counters.
    async fn stats(&self) -> PersisterStats;
}

/// Keep `state` only if it was produced for parameters compatible with
/// `parameters`. `NotReady` carries no parameters and is never compatible.
pub fn compatible_state<S: DatasourceState>(state: S, parameters: &S::Params) -> Option<S> {
    let compatible = state
        .load_impulse()
        .map(|impulse| impulse.parameters().is_cache_compatible(parameters))
        .unwrap_or(false);
    compatible.then_some(state)
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Statistics about persister usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersisterStats {
    /// Number of successful persist calls.
    pub persists: u64,
    /// Number of load calls.
    pub loads: u64,
    /// Loads that returned a compatible state.
    pub hits: u64,
    /// Loads that returned nothing.
    pub misses: u64,
    /// Number of purge calls.
    pub purges: u64,
}

impl PersisterStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters behind [`PersisterStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    persists: AtomicU64,
    loads: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    purges: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_persist(&self) {
        self.persists.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self, hit: bool) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_purge(&self) {
        self.purges.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PersisterStats {
        PersisterStats {
            persists: self.persists.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
        }
    }
}
