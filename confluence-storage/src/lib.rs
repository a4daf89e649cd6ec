//! Confluence Storage - State Persisters
//!
//! Defines the [`StatePersister`] contract that cached datasources write
//! fresh primary results through, plus two implementations:
//!
//! - [`InMemoryStatePersister`]: process lifetime, used when no disk cache
//!   is configured
//! - [`LmdbStatePersister`]: LMDB on disk, survives restarts
//!
//! Both filter loads by cache compatibility, so a state fetched for other
//! parameters is never handed back.

pub mod codec;
pub mod lmdb;
pub mod memory;
pub mod persister;

pub use codec::{decode_record, encode_record, PersistedRecord};
pub use lmdb::{LmdbPersisterError, LmdbStatePersister};
pub use memory::InMemoryStatePersister;
pub use persister::{compatible_state, PersisterStats, StatePersister};
