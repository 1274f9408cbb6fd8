// SPDX-License-Identifier: Apache-2.0

//! fedbridge: the bridge between a relational engine and external datasets.
//!
//! The read path validates a requested schema against an external dataset
//! and plans one [`Fragment`](fragment::Fragment) per storage unit. The write
//! path spreads submitted rows across parallel write units that insert them
//! into a remote store through a [`RemoteClient`].

pub mod config;
pub mod context;
pub mod fragment;
pub mod metrics;
pub mod observability;
pub mod remote;
pub mod schema;
pub mod write;

pub use fedbridge_core::types::*;
pub use fedbridge_core::{
    BridgeError, BridgeResult, ConfigError, MetadataProvider, PlanError, ProviderError, RemoteClient, RemoteError,
    SchemaMismatch, SqlDialect, StateError, WriteError,
};

pub use config::{WriteOptions, WriteStrategy};
pub use context::RequestContext;
pub use fragment::{Fragment, FragmentPlanner, PlanOptions};
pub use schema::validate_schema;
pub use write::{WriteSession, WriteSummary};
