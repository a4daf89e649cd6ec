//! In-memory state persister.

use async_trait::async_trait;
use confluence_core::{ConfluenceResult, DatasourceState};
use tokio::sync::RwLock;

use crate::persister::{compatible_state, PersisterStats, StatePersister, StatsRecorder};

/// Persister that keeps the state for the lifetime of the process.
///
/// Used when no disk cache is configured, and in tests.
#[derive(Debug)]
pub struct InMemoryStatePersister<S> {
    stored: RwLock<Option<S>>,
    stats: StatsRecorder,
}

impl<S> Default for InMemoryStatePersister<S> {
    fn default() -> Self {
        Self {
            stored: RwLock::new(None),
            stats: StatsRecorder::default(),
        }
    }
}

impl<S: DatasourceState> InMemoryStatePersister<S> {
    /// Create an empty persister.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a persister that already holds `state`.
    pub fn with_state(state: S) -> Self {
        Self {
            stored: RwLock::new(Some(state)),
            stats: StatsRecorder::default(),
        }
    }

    /// The stored state, unfiltered.
    pub async fn stored(&self) -> Option<S> {
        self.stored.read().await.clone()
    }
}

#[async_trait]
impl<S: DatasourceState> StatePersister for InMemoryStatePersister<S> {
    type State = S;

    async fn persist(&self, state: &S) -> ConfluenceResult<()> {
        *self.stored.write().await = Some(state.clone());
        self.stats.record_persist();
        Ok(())
    }

    async fn load(&self, parameters: &S::Params) -> ConfluenceResult<Option<S>> {
        let stored = self.stored.read().await.clone();
        let state = stored.and_then(|state| compatible_state(state, parameters));
        self.stats.record_load(state.is_some());
        Ok(state)
    }

    async fn purge(&self) -> ConfluenceResult<()> {
        *self.stored.write().await = None;
        self.stats.record_purge();
        Ok(())
    }

    async fn stats(&self) -> PersisterStats {
        self.stats.snapshot()
    }
}
