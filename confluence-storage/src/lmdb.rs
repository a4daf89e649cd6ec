//! LMDB-backed state persister.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep the last persisted
//! state on disk, so a cache datasource can show it on the next start.
//!
//! # Layout
//!
//! One unnamed database; one record per persister, stored under the
//! configured cache key. Records use the format in [`crate::codec`].
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The persister uses:
//! - Read transactions for `load` and `persisted_at`
//! - Write transactions for `persist` and `purge`
//! - Statistics are tracked with atomic counters

use std::marker::PhantomData;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confluence_core::{
    ConfluenceError, ConfluenceResult, DatasourceState, PersistenceError, PersisterConfig,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::codec::{decode_record, encode_record, PersistedRecord};
use crate::persister::{compatible_state, PersisterStats, StatePersister, StatsRecorder};

/// Error type for LMDB persister operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbPersisterError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbPersisterError to ConfluenceError.
impl From<LmdbPersisterError> for ConfluenceError {
    fn from(e: LmdbPersisterError) -> Self {
        let reason = e.to_string();
        match e {
            LmdbPersisterError::Transaction(_) => {
                ConfluenceError::Persistence(PersistenceError::TransactionFailed { reason })
            }
            LmdbPersisterError::EnvOpen(_)
            | LmdbPersisterError::DbOpen(_)
            | LmdbPersisterError::Config(_)
            | LmdbPersisterError::Io(_) => {
                ConfluenceError::Persistence(PersistenceError::Unavailable { reason })
            }
        }
    }
}

/// State persister backed by an LMDB environment.
///
/// # Example
///
/// ```ignore
/// use confluence_core::PersisterConfig;
/// use confluence_storage::{LmdbStatePersister, StatePersister};
///
/// let config = PersisterConfig::new("/var/cache/app", "feed");
/// let persister = LmdbStatePersister::<FeedState>::open(&config)?;
///
/// persister.persist(&state).await?;
/// let restored = persister.load(&parameters).await?;
/// ```
pub struct LmdbStatePersister<S> {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Key of this persister's record.
    key: Vec<u8>,
    stats: StatsRecorder,
    _state: PhantomData<fn() -> S>,
}

impl<S> LmdbStatePersister<S>
where
    S: DatasourceState + Serialize + DeserializeOwned,
{
    /// Open the persister described by `config`.
    pub fn open(config: &PersisterConfig) -> Result<Self, LmdbPersisterError> {
        config
            .validate()
            .map_err(|e| LmdbPersisterError::Config(e.to_string()))?;
        Self::new(&config.directory, &config.cache_key, config.max_size_mb)
    }

    /// Create a new LMDB persister.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `cache_key` - Key of the persisted record
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(
        path: P,
        cache_key: &str,
        max_size_mb: usize,
    ) -> Result<Self, LmdbPersisterError> {
        let map_size = max_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbPersisterError::Config(format!("max_size_mb too large: {max_size_mb}"))
        })?;

        // Ensure directory exists
        std::fs::create_dir_all(&path)?;

        // Open LMDB environment
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbPersisterError::EnvOpen(e.to_string()))?;

        // Open the default database
        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbPersisterError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            key: cache_key.as_bytes().to_vec(),
            stats: StatsRecorder::default(),
            _state: PhantomData,
        })
    }

    /// Read and decode the stored record, if any.
    fn read_record(&self) -> ConfluenceResult<Option<PersistedRecord<S>>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        let bytes = self
            .db
            .get(&rtxn, &self.key)
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        match bytes {
            Some(bytes) => Ok(Some(decode_record(bytes)?)),
            None => Ok(None),
        }
    }

    /// When the stored state was written.
    pub fn persisted_at(&self) -> ConfluenceResult<Option<DateTime<Utc>>> {
        Ok(self.read_record()?.map(|record| record.persisted_at))
    }
}

#[async_trait]
impl<S> StatePersister for LmdbStatePersister<S>
where
    S: DatasourceState + Serialize + DeserializeOwned,
{
    type State = S;

    async fn persist(&self, state: &S) -> ConfluenceResult<()> {
        let full_bytes = encode_record(state, Utc::now())?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, &self.key, &full_bytes)
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        self.stats.record_persist();
        debug!(bytes = full_bytes.len(), "persisted state");
        Ok(())
    }

    async fn load(&self, parameters: &S::Params) -> ConfluenceResult<Option<S>> {
        let state = match self.read_record() {
            Ok(record) => record.and_then(|record| compatible_state(record.state, parameters)),
            Err(e) => {
                self.stats.record_load(false);
                return Err(e);
            }
        };
        self.stats.record_load(state.is_some());
        Ok(state)
    }

    async fn purge(&self) -> ConfluenceResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, &self.key)
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbPersisterError::Transaction(e.to_string()))?;

        self.stats.record_purge();
        debug!(deleted, "purged persisted state");
        Ok(())
    }

    async fn stats(&self) -> PersisterStats {
        self.stats.snapshot()
    }
}
