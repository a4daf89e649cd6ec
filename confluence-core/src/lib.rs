//! Confluence Core - State Model and Reconciliation Rules
//!
//! Pure value types and pure functions. All other crates depend on this.
//! Nothing in this crate spawns tasks, touches the disk or needs a runtime.
//!
//! - [`LoadImpulse`]: one load request (parameters, reason, skip policy)
//! - [`State`] / [`CompositeState`]: per-source and merged states
//! - [`reconcile`] / [`retain_last_result`]: the merge rules, both built
//!   on [`resolve_with_fallback`]
//! - [`Datasource`]: the stream capability every source implements

pub mod composite;
pub mod config;
pub mod datasource;
pub mod error;
pub mod impulse;
pub mod parameters;
pub mod reconcile;
pub mod state;

pub use composite::{CompositeOf, CompositeState};
pub use config::{DatasourceConfig, PersisterConfig, TimerMode};
pub use datasource::{Datasource, StateStream};
pub use error::{
    CachedDatasourceError, ConfigError, ConfluenceError, ConfluenceResult, DatasourceError,
    DatasourceErrorType, PersistenceError,
};
pub use impulse::LoadImpulse;
pub use parameters::{
    DefaultLoadImpulseType, LoadImpulseType, Parameters, StateValue, VoidParameters,
};
pub use reconcile::{
    reconcile, resolve_with_fallback, retain_last_result, should_persist, Reconciliation,
};
pub use state::{DatasourceState, ImpulseOf, ProvisioningState, State};
