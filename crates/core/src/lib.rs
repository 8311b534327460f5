//! minibroker-core: the service broker engine.
//!
//! Turns "service + plan" requests into installed chart releases and
//! bindable credentials. The crate owns the instance lifecycle; the chart
//! repository, installer and cluster API are collaborators supplied by the
//! caller through the traits in [`repository`], [`installer`] and [`cluster`].
//!
//! # Public API
//!
//! - [`Broker`] / [`BrokerBuilder`] -- the broker facade
//! - [`Broker::provision`], [`Broker::deprovision`], [`Broker::bind`],
//!   [`Broker::last_operation`], [`Broker::list_catalog`]
//! - [`build_catalog`] -- catalog aggregation from chart listings
//! - [`ConfigMapInstanceStore`] -- cluster-backed instance records
//! - [`ProviderRegistry`] -- per-service credential shaping

pub mod association;
pub mod bind;
pub mod broker;
pub mod catalog;
pub mod cluster;
pub mod config;
pub mod deprovision;
pub mod error;
pub mod installer;
pub mod operation;
pub mod provider;
pub mod provision;
pub mod repository;
pub mod store;
mod tasks;

// ── Convenience re-exports ───────────────────────────────────────────

pub use association::{ResourceAssociation, Resources};
pub use bind::{merge_params, BindRequest};
pub use broker::{Broker, BrokerBuilder};
pub use catalog::{build_catalog, Catalog, Plan, Service};
pub use config::{BrokerConfig, ConfigError};
pub use deprovision::{DeprovisionOutcome, DeprovisionRequest};
pub use error::{BrokerError, ErrorKind, UpstreamError};
pub use operation::{LastOperation, OperationKind, OperationTracker};
pub use provider::{Credentials, Provider, ProviderError, ProviderRegistry};
pub use provision::{ProvisionOutcome, ProvisionRequest};
pub use repository::{ChartRepository, ChartVersion, IndexFile, RepositoryError};
pub use store::ConfigMapInstanceStore;

pub use minibroker_storage::{InstanceRecord, InstanceStore, OperationState};
