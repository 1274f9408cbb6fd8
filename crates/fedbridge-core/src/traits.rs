// SPDX-License-Identifier: Apache-2.0

//! Collaborator traits
//!
//! The bridge never talks to a catalog or a remote store directly. It goes
//! through these two seams, so every backend (Hive metastore, a JDBC-style
//! SQL store, an in-memory fixture in tests) plugs in the same way.

use async_trait::async_trait;

use crate::dialect::SqlDialect;
use crate::error::{ProviderError, RemoteError};
use crate::types::{DatasetLocation, ExecutionOutcome, ExternalSchema, Row, StorageUnit};

/// Metadata and storage layout of external datasets.
///
/// Implementations may be shared read-only across concurrent planning calls.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Declared data and partition columns plus the table-level storage descriptor
    async fn describe_schema(&self, dataset: &DatasetLocation) -> Result<ExternalSchema, ProviderError>;

    /// Physical storage units in the storage layer's natural enumeration order
    async fn list_storage_units(&self, dataset: &DatasetLocation) -> Result<Vec<StorageUnit>, ProviderError>;
}

/// Executes parameterized writes against a remote store.
///
/// A statement handle is owned by exactly one write unit at a time and is
/// never shared. `release` gives it back (closing the statement and returning
/// its connection).
#[async_trait]
pub trait RemoteClient: Send + Sync + 'static {
    type Statement: Send + 'static;

    /// Dialect used to build the statement text handed to `prepare`
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    async fn prepare(&self, query: &str) -> Result<Self::Statement, RemoteError>;

    /// Executes the statement once per row. With more than one row the call
    /// is a single batched operation.
    async fn execute(
        &self,
        statement: &mut Self::Statement,
        rows: &[Row],
    ) -> Result<ExecutionOutcome, RemoteError>;

    async fn release(&self, statement: Self::Statement);
}
