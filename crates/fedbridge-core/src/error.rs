// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for fedbridge
//!
//! Four families with different handling rules:
//! - [`SchemaMismatch`]: static pre-flight gate, never retried.
//! - [`PlanError`]: metadata/storage collaborator failure or malformed dataset.
//! - [`StateError`]: caller contract violation, always a defect.
//! - [`WriteError`]: remote execution failure, captured per flush and
//!   surfaced once when a write session drains.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pre-flight validation failure between requested and external columns.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SchemaMismatch {
    #[error(
        "External schema ({data_columns} data columns, {partition_columns} partition columns) \
         doesn't match requested schema: {requested} vs {external} columns"
    )]
    ColumnCount {
        requested: usize,
        external: usize,
        data_columns: usize,
        partition_columns: usize,
    },

    #[error(
        "Invalid definition for column {column} (ordinal {ordinal}): \
         requested type {requested_type} is not compatible with external type {external_type}"
    )]
    IncompatibleType {
        ordinal: usize,
        column: CompactString,
        requested_type: String,
        external_type: CompactString,
    },

    #[error("Unrecognized external type '{native_type}' for column {column} (ordinal {ordinal}): {message}")]
    UnparsableNativeType {
        ordinal: usize,
        column: CompactString,
        native_type: CompactString,
        message: String,
    },
}

impl SchemaMismatch {
    pub fn column_count(requested: usize, data_columns: usize, partition_columns: usize) -> Self {
        Self::ColumnCount {
            requested,
            external: data_columns + partition_columns,
            data_columns,
            partition_columns,
        }
    }

    /// Total number of external columns (data + partition) for a count mismatch.
    pub fn external_width(&self) -> Option<usize> {
        match self {
            SchemaMismatch::ColumnCount { external, .. } => Some(*external),
            _ => None,
        }
    }

    /// Ordinal of the offending column for per-column failures.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            SchemaMismatch::ColumnCount { .. } => None,
            SchemaMismatch::IncompatibleType { ordinal, .. }
            | SchemaMismatch::UnparsableNativeType { ordinal, .. } => Some(*ordinal),
        }
    }
}

/// Failure to produce fragments for a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlanError {
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    #[error("Metadata provider error for {dataset}: {message}")]
    Provider { dataset: String, message: String },

    #[error("Malformed dataset {dataset}: {message}")]
    MalformedDataset { dataset: String, message: String },

    #[error("Input format {input_format} is not supported for {dataset} (supported: {supported})")]
    UnsupportedInputFormat {
        dataset: String,
        input_format: String,
        supported: String,
    },
}

impl PlanError {
    pub fn provider(dataset: impl ToString, msg: impl Into<String>) -> Self {
        Self::Provider {
            dataset: dataset.to_string(),
            message: msg.into(),
        }
    }

    pub fn malformed(dataset: impl ToString, msg: impl Into<String>) -> Self {
        Self::MalformedDataset {
            dataset: dataset.to_string(),
            message: msg.into(),
        }
    }
}

/// Error reported by a metadata/storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Error reported by a remote execution client.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    /// SQLSTATE or store-specific code, when the remote side provides one
    pub code: Option<String>,
}

impl RemoteError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Caller contract violation on the write path.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StateError {
    #[error("Trying to supply a row to a full write unit")]
    UnitFull,

    #[error("Trying to supply an empty row")]
    EmptyRow,

    #[error("Row has {actual} values but the session expects {expected}")]
    RowWidth { expected: usize, actual: usize },

    #[error("Write session was cancelled")]
    Cancelled,

    #[error("Write session is already drained")]
    Closed,

    #[error("Write worker {unit} is no longer running")]
    WorkerGone { unit: usize },
}

/// Remote write failure, captured per flush.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WriteError {
    #[error("Failed to prepare remote statement on unit {unit}: {message}")]
    Prepare { unit: usize, message: String },

    /// `row` is the row's submission index within the session.
    #[error("Remote write of row {row} on unit {unit} failed: {message}")]
    Execute {
        unit: usize,
        row: u64,
        message: String,
    },

    /// `rows` lists the submission indexes of every row in the failed batch.
    #[error("Remote batch of rows {rows:?} on unit {unit} failed: {message}")]
    Batch {
        unit: usize,
        rows: Vec<u64>,
        message: String,
    },

    #[error("Remote batch of {rows} rows on unit {unit} reported failed rows {failed_rows:?}: {message}")]
    PartialBatch {
        unit: usize,
        rows: usize,
        failed_rows: Vec<u64>,
        message: String,
    },

    #[error("Row {row} rejected by write unit {unit}: {message}")]
    Rejected { unit: usize, row: u64, message: String },

    #[error("Write worker {unit} panicked: {message}")]
    WorkerPanicked { unit: usize, message: String },
}

impl WriteError {
    /// Write unit the failure is attributed to.
    pub fn unit(&self) -> usize {
        match self {
            WriteError::Prepare { unit, .. }
            | WriteError::Execute { unit, .. }
            | WriteError::Batch { unit, .. }
            | WriteError::PartialBatch { unit, .. }
            | WriteError::Rejected { unit, .. }
            | WriteError::WorkerPanicked { unit, .. } => *unit,
        }
    }
}

/// Invalid option value supplied when opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for option {option}: {message}")]
    InvalidValue {
        option: String,
        value: String,
        message: String,
    },

    #[error("Routing key column '{column}' is not part of the requested columns")]
    UnknownRoutingKey { column: String },
}

impl ConfigError {
    pub fn invalid(option: impl Into<String>, value: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidValue {
            option: option.into(),
            value: value.into(),
            message: msg.into(),
        }
    }
}

/// Unified error type for bridge entry points
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BridgeError {
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
