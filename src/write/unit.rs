// SPDX-License-Identifier: Apache-2.0

//! Write units.
//!
//! A write unit holds at most one pending row group and turns it into one
//! remote write. Supplying and flushing strictly alternate: a unit that
//! needs a flush rejects further rows until it has been flushed.
//!
//! Remote failures never escape as panics or early returns across the unit
//! boundary. `flush` hands them back as a [`WriteError`] and the unit is
//! immediately reusable.
//!
//! Every row arrives with its submission index (`seq`), assigned by the
//! coordinator across the whole session. Errors name rows by that index, so
//! a caller can tell which of its rows failed whatever unit wrote them.

use std::sync::Arc;

use fedbridge_core::{ExecutionOutcome, RemoteClient, RemoteError, Row, StateError, WriteError};
use tracing::debug;

/// Observable state of a unit between calls.
///
/// While `flush` runs, the unit is mutably borrowed by the flushing task,
/// so nobody else can observe or supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Holding,
}

/// Executes one INSERT per supplied row.
///
/// Without a caller-provided statement, `flush` prepares one, uses it for the
/// single write and releases it again, so one-shot units never keep a
/// connection checked out.
pub struct SingleRowWriter<C: RemoteClient> {
    id: usize,
    client: Arc<C>,
    query: Arc<str>,
    statement: Option<C::Statement>,
    row: Option<(u64, Row)>,
}

impl<C: RemoteClient> SingleRowWriter<C> {
    pub fn new(id: usize, client: Arc<C>, query: Arc<str>, statement: Option<C::Statement>) -> Self {
        Self {
            id,
            client,
            query,
            statement,
            row: None,
        }
    }

    pub fn supply(&mut self, seq: u64, row: Row) -> Result<(), StateError> {
        if self.row.is_some() {
            return Err(StateError::UnitFull);
        }
        if row.is_empty() {
            return Err(StateError::EmptyRow);
        }
        self.row = Some((seq, row));
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.row.is_some()
    }

    /// Writes the held row. Returns the number of rows written (0 when idle).
    pub async fn flush(&mut self) -> Result<usize, WriteError> {
        let Some((seq, row)) = self.row.take() else {
            return Ok(0);
        };

        let acquired_here = self.statement.is_none();
        let mut statement = match self.statement.take() {
            Some(statement) => statement,
            None => self.client.prepare(&self.query).await.map_err(|e| WriteError::Prepare {
                unit: self.id,
                message: e.message,
            })?,
        };

        let result = self
            .client
            .execute(&mut statement, std::slice::from_ref(&row))
            .await;

        if acquired_here {
            self.client.release(statement).await;
        } else {
            self.statement = Some(statement);
        }

        match result {
            Ok(outcome) => match outcome.row_failures.into_iter().next() {
                Some(failure) => Err(WriteError::Execute {
                    unit: self.id,
                    row: seq,
                    message: failure.message,
                }),
                None => Ok(1),
            },
            Err(e) => Err(WriteError::Execute {
                unit: self.id,
                row: seq,
                message: e.message,
            }),
        }
    }

    /// Hands back a caller-provided statement; pending rows are dropped.
    pub fn into_statement(self) -> Option<C::Statement> {
        self.statement
    }
}

/// Accumulates rows and writes them as one batched remote operation.
///
/// The statement, whether caller-provided or prepared on first flush, is
/// kept across flush cycles and only released by [`BatchedWriter::close`].
pub struct BatchedWriter<C: RemoteClient> {
    id: usize,
    client: Arc<C>,
    query: Arc<str>,
    statement: Option<C::Statement>,
    statement_owned: bool,
    batch_size: usize,
    pending: Vec<Row>,
    /// Submission index of each pending row
    seqs: Vec<u64>,
}

impl<C: RemoteClient> BatchedWriter<C> {
    pub fn new(
        id: usize,
        client: Arc<C>,
        query: Arc<str>,
        statement: Option<C::Statement>,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            id,
            client,
            query,
            statement,
            statement_owned: false,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            seqs: Vec::with_capacity(batch_size),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn supply(&mut self, seq: u64, row: Row) -> Result<(), StateError> {
        if self.needs_flush() {
            return Err(StateError::UnitFull);
        }
        if row.is_empty() {
            return Err(StateError::EmptyRow);
        }
        self.pending.push(row);
        self.seqs.push(seq);
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    /// Writes every pending row in one call, full group or not.
    pub async fn flush(&mut self) -> Result<usize, WriteError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let rows = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let seqs = std::mem::replace(&mut self.seqs, Vec::with_capacity(self.batch_size));

        if self.statement.is_none() {
            match self.client.prepare(&self.query).await {
                Ok(statement) => {
                    self.statement = Some(statement);
                    self.statement_owned = true;
                }
                Err(e) => {
                    return Err(WriteError::Prepare {
                        unit: self.id,
                        message: e.message,
                    })
                }
            }
        }
        let Some(statement) = self.statement.as_mut() else {
            return Err(WriteError::Prepare {
                unit: self.id,
                message: "no statement available".to_string(),
            });
        };

        let result = self.client.execute(statement, &rows).await;
        debug!(unit = self.id, rows = rows.len(), ok = result.is_ok(), "Batch executed");
        self.attribute(seqs, result)
    }

    /// Whole-batch attribution when the call fails; per-row attribution when
    /// the store reports individual row outcomes.
    fn attribute(&self, seqs: Vec<u64>, result: Result<ExecutionOutcome, RemoteError>) -> Result<usize, WriteError> {
        let rows = seqs.len();
        match result {
            Err(e) => Err(WriteError::Batch {
                unit: self.id,
                rows: seqs,
                message: e.message,
            }),
            Ok(outcome) if outcome.row_failures.is_empty() => Ok(rows),
            Ok(outcome) => {
                let message = outcome
                    .row_failures
                    .first()
                    .map(|f| f.message.clone())
                    .unwrap_or_default();
                Err(WriteError::PartialBatch {
                    unit: self.id,
                    rows,
                    failed_rows: outcome
                        .row_failures
                        .iter()
                        .filter_map(|f| seqs.get(f.index).copied())
                        .collect(),
                    message,
                })
            }
        }
    }

    /// Releases a statement this unit prepared and hands back a
    /// caller-provided one. Pending rows are dropped.
    pub async fn close(mut self) -> Option<C::Statement> {
        let statement = self.statement.take()?;
        if self.statement_owned {
            self.client.release(statement).await;
            None
        } else {
            Some(statement)
        }
    }
}

/// The closed set of write strategies behind one interface.
pub enum WriteUnit<C: RemoteClient> {
    SingleRow(SingleRowWriter<C>),
    Batched(BatchedWriter<C>),
}

impl<C: RemoteClient> WriteUnit<C> {
    pub fn supply(&mut self, seq: u64, row: Row) -> Result<(), StateError> {
        match self {
            WriteUnit::SingleRow(unit) => unit.supply(seq, row),
            WriteUnit::Batched(unit) => unit.supply(seq, row),
        }
    }

    pub fn needs_flush(&self) -> bool {
        match self {
            WriteUnit::SingleRow(unit) => unit.needs_flush(),
            WriteUnit::Batched(unit) => unit.needs_flush(),
        }
    }

    /// True when rows are held that have not been written yet.
    pub fn has_pending(&self) -> bool {
        match self {
            WriteUnit::SingleRow(unit) => unit.needs_flush(),
            WriteUnit::Batched(unit) => unit.pending() > 0,
        }
    }

    pub fn state(&self) -> UnitState {
        if self.has_pending() {
            UnitState::Holding
        } else {
            UnitState::Idle
        }
    }

    pub async fn flush(&mut self) -> Result<usize, WriteError> {
        match self {
            WriteUnit::SingleRow(unit) => unit.flush().await,
            WriteUnit::Batched(unit) => unit.flush().await,
        }
    }

    /// Releases unit-owned handles. A caller-provided statement is returned
    /// for the caller to release.
    pub async fn close(self) -> Option<C::Statement> {
        match self {
            WriteUnit::SingleRow(unit) => unit.into_statement(),
            WriteUnit::Batched(unit) => unit.close().await,
        }
    }
}
