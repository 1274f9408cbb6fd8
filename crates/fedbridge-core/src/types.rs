// SPDX-License-Identifier: Apache-2.0

//! Universal data types shared by the read and write paths.
//!
//! These types describe both sides of a binding: the relational columns a
//! caller asks for, and the external dataset's own declared layout.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a write session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Universal value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A single row of data (indexed by negotiated column order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// A row with no values carries nothing to write and is rejected by write units.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// Logical type of a relational column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Text,
    Varchar,
    Bpchar,
    Bytea,
    Date,
    Timestamp,
    TimestampTz,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::SmallInt => "smallint",
            DataType::Integer => "integer",
            DataType::BigInt => "bigint",
            DataType::Real => "real",
            DataType::Double => "double precision",
            DataType::Numeric => "numeric",
            DataType::Text => "text",
            DataType::Varchar => "varchar",
            DataType::Bpchar => "bpchar",
            DataType::Bytea => "bytea",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
            DataType::TimestampTz => "timestamptz",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A column requested by the relational side of a binding.
///
/// `modifiers` follows the relational engine's typmod convention:
/// `[precision, scale]` for numeric, `[length]` for varchar and bpchar,
/// empty when the type is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: CompactString,
    pub data_type: DataType,
    #[serde(default)]
    pub modifiers: Vec<u32>,
    pub ordinal: usize,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<CompactString>, data_type: DataType, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            modifiers: Vec::new(),
            ordinal,
        }
    }

    pub fn with_modifiers(mut self, modifiers: impl Into<Vec<u32>>) -> Self {
        self.modifiers = modifiers.into();
        self
    }

    /// Declared length for varchar/bpchar columns.
    pub fn length(&self) -> Option<u32> {
        match self.data_type {
            DataType::Varchar | DataType::Bpchar => self.modifiers.first().copied(),
            _ => None,
        }
    }

    /// Declared `(precision, scale)` for numeric columns; scale defaults to 0.
    pub fn precision_scale(&self) -> Option<(u32, u32)> {
        match (self.data_type, self.modifiers.as_slice()) {
            (DataType::Numeric, [p]) => Some((*p, 0)),
            (DataType::Numeric, [p, s, ..]) => Some((*p, *s)),
            _ => None,
        }
    }

    /// Human-readable type including modifiers, e.g. `numeric(12,2)`.
    pub fn type_display(&self) -> String {
        if self.modifiers.is_empty() {
            self.data_type.to_string()
        } else {
            let mods = self
                .modifiers
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!("{}({})", self.data_type, mods)
        }
    }
}

/// Namespace represents the hierarchy level above tables
/// - For PostgreSQL: database + schema
/// - For Hive and MySQL: database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub schema: Option<String>,
}

impl Namespace {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: None,
        }
    }

    pub fn with_schema(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: Some(schema.into()),
        }
    }
}

/// Location of an external dataset: the table a fragment planner or a
/// remote writer is bound to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DatasetLocation {
    pub namespace: Namespace,
    pub table: String,
}

impl DatasetLocation {
    pub fn new(namespace: Namespace, table: impl Into<String>) -> Self {
        Self {
            namespace,
            table: table.into(),
        }
    }
}

impl fmt::Display for DatasetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace.schema {
            Some(schema) => write!(f, "{}.{}.{}", self.namespace.database, schema, self.table),
            None => write!(f, "{}.{}", self.namespace.database, self.table),
        }
    }
}

/// One column as declared by the external store, with its native type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalColumn {
    pub name: CompactString,
    pub native_type: CompactString,
}

impl ExternalColumn {
    pub fn new(name: impl Into<CompactString>, native_type: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
        }
    }
}

/// How the external store encodes a table (or one partition of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    /// Fully-qualified input format class, e.g. `org.apache.hadoop.mapred.TextInputFormat`
    pub input_format: String,
    /// Serialization library class used to decode records
    pub serde: String,
    /// Serde properties (field delimiters, column lists...)
    #[serde(default)]
    pub serde_properties: BTreeMap<String, String>,
}

/// Declared layout of an external dataset.
///
/// Partition columns are never stored in the data files; their values come
/// from each storage unit's location. They are always matched after the
/// data columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSchema {
    pub data_columns: Vec<ExternalColumn>,
    pub partition_columns: Vec<ExternalColumn>,
    pub storage: StorageDescriptor,
}

impl ExternalSchema {
    /// Total number of columns a requester must declare.
    pub fn width(&self) -> usize {
        self.data_columns.len() + self.partition_columns.len()
    }

    /// Data columns followed by partition columns.
    pub fn columns(&self) -> impl Iterator<Item = &ExternalColumn> {
        self.data_columns.iter().chain(self.partition_columns.iter())
    }
}

/// Byte range of one independently readable unit inside a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    pub path: String,
    pub start: u64,
    pub length: u64,
}

impl SourceLocator {
    pub fn new(path: impl Into<String>, start: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            start,
            length,
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}+{}", self.path, self.start, self.length)
    }
}

/// A physical storage unit as enumerated by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnit {
    pub locator: SourceLocator,
    /// Hosts holding a replica; advisory only.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Values of the schema's partition columns for this unit, in declaration order.
    #[serde(default)]
    pub partition_values: Vec<String>,
    /// Per-partition storage override (partitions may use their own format).
    #[serde(default)]
    pub storage: Option<StorageDescriptor>,
}

impl StorageUnit {
    pub fn new(locator: SourceLocator) -> Self {
        Self {
            locator,
            hosts: Vec::new(),
            partition_values: Vec::new(),
            storage: None,
        }
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_partition_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_storage(mut self, storage: StorageDescriptor) -> Self {
        self.storage = Some(storage);
        self
    }
}

/// Per-row failure reported by a remote store that exposes batch outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    /// Position of the row inside the executed batch
    pub index: usize,
    pub message: String,
}

/// Result of one remote execute call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub rows_affected: u64,
    /// Empty when the store does not report per-row outcomes.
    #[serde(default)]
    pub row_failures: Vec<RowFailure>,
}

impl ExecutionOutcome {
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            row_failures: Vec::new(),
        }
    }
}
