// SPDX-License-Identifier: Apache-2.0

//! Per-request context passed explicitly through planning and write calls.

use fedbridge_core::{ColumnDescriptor, DatasetLocation};
use serde::{Deserialize, Serialize};

/// The external dataset a request is bound to and the columns it negotiates.
///
/// Columns are immutable once the request is built and live exactly as long
/// as one read or write operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub dataset: DatasetLocation,
    pub columns: Vec<ColumnDescriptor>,
}

impl RequestContext {
    pub fn new(dataset: DatasetLocation, columns: Vec<ColumnDescriptor>) -> Self {
        Self { dataset, columns }
    }

    /// Position of the column named `name` (case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}
