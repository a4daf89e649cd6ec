//! Confluence Engine - Reactive Cached Datasources
//!
//! Wires the pure merge rules of `confluence-core` to live streams on tokio.
//!
//! # Architecture
//!
//! ```text
//!                     LoadImpulseEmitter
//!             ┌───────────────┼────────────────┐
//!             ▼               ▼                ▼
//!   primary Datasource   cache Datasource   (impulses)
//!   (network, retaining)  (PlainCache ← StatePersister)
//!             └───────────────┼────────────────┘
//!                             ▼
//!                     CachedDatasource ──persist──► StatePersister
//!                             │
//!                             ▼
//!                    CompositeState stream
//! ```
//!
//! Every component subscribes to the same emitter, so a new request reaches
//! the primary fetch, the cache lookup and the merge together. Results that
//! arrive for a superseded request resolve to `NotReady`.
//!
//! # Key Types
//!
//! - [`CachedDatasource`]: the merge engine
//! - [`LastResultRetainingDatasource`]: backs a source with its own history
//! - [`PlainCacheDatasource`]: replays a persister as a datasource
//! - [`CachedDatasourceBundle`]: the usual assembly of the above
//! - [`DefaultLoadImpulseEmitter`] / [`RecurringLoadImpulseEmitter`]
//! - [`ItemsTransformer`]: state to list items

mod bundle;
mod cached;
mod combine;
mod emitter;
mod list_items;
mod plain_cache;
mod property;
mod retaining;

pub use bundle::CachedDatasourceBundle;
pub use cached::{CachedDatasource, DatasourceFor};
pub use combine::{combine_latest3, skip_repeats};
pub use emitter::{DefaultLoadImpulseEmitter, LoadImpulseEmitter, RecurringLoadImpulseEmitter};
pub use list_items::{ItemsTransformer, ListItems};
pub use plain_cache::{EmitterFor, PersisterFor, PlainCacheDatasource};
pub use property::StateProperty;
pub use retaining::{DatasourceExt, LastResultRetainingDatasource};

// Re-export core types for convenience
pub use confluence_core::{
    CompositeOf, CompositeState, Datasource, DatasourceState, ImpulseOf, LoadImpulse,
    ProvisioningState, State, StateStream, TimerMode,
};
