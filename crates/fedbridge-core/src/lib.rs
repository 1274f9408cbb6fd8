// SPDX-License-Identifier: Apache-2.0

//! fedbridge core
//!
//! Shared data model, collaborator traits and error handling used by the
//! fragment planner and the write engine.

pub mod dialect;
pub mod error;
pub mod traits;
pub mod types;

pub use dialect::SqlDialect;
pub use error::{
    BridgeError, BridgeResult, ConfigError, PlanError, ProviderError, RemoteError, SchemaMismatch,
    StateError, WriteError,
};
pub use traits::{MetadataProvider, RemoteClient};
pub use types::*;
