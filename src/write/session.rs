// SPDX-License-Identifier: Apache-2.0

//! Write sessions.
//!
//! A session binds one request context to a remote client: it builds the
//! insert statement once, creates the configured number of write units and
//! hands them to a [`WriteCoordinator`]. Rows are submitted in any order and
//! `close` reports the first failure any unit produced.

use std::sync::Arc;

use fedbridge_core::{BridgeResult, ConfigError, RemoteClient, Row, SessionId, StateError, WriteError};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{WriteOptions, WriteStrategy};
use crate::context::RequestContext;
use crate::metrics;

use super::coordinator::WriteCoordinator;
use super::routing::RoutingPolicy;
use super::unit::{BatchedWriter, SingleRowWriter, WriteUnit};

/// Counters reported by a successfully closed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub rows_submitted: u64,
    pub rows_written: u64,
}

pub struct WriteSession<C: RemoteClient> {
    id: SessionId,
    client: Arc<C>,
    coordinator: WriteCoordinator<C>,
    width: usize,
    query: Arc<str>,
    strategy: WriteStrategy,
}

impl<C: RemoteClient> WriteSession<C> {
    /// Opens a session for `context` with the given options.
    ///
    /// Batched units are given a statement prepared here, so a remote that
    /// refuses the insert fails the open instead of the first flush.
    #[instrument(skip_all, fields(dataset = %context.dataset))]
    pub async fn open(client: Arc<C>, context: &RequestContext, options: &WriteOptions) -> BridgeResult<Self> {
        options.validate()?;
        if context.columns.is_empty() {
            return Err(ConfigError::invalid("columns", "[]", "a write needs at least one column").into());
        }

        let routing = match &options.routing_key {
            Some(column) => {
                let index = context
                    .column_index(column)
                    .ok_or_else(|| ConfigError::UnknownRoutingKey { column: column.clone() })?;
                RoutingPolicy::Sticky { column: index }
            }
            None => RoutingPolicy::RoundRobin,
        };

        let query: Arc<str> = Arc::from(
            client
                .dialect()
                .insert_statement(&context.dataset, &context.columns),
        );
        let parallelism = options.effective_parallelism();
        let strategy = options.strategy();

        let mut units = Vec::with_capacity(parallelism);
        for id in 0..parallelism {
            let unit = match strategy {
                WriteStrategy::SingleRow => {
                    WriteUnit::SingleRow(SingleRowWriter::new(id, Arc::clone(&client), Arc::clone(&query), None))
                }
                WriteStrategy::Batched { batch_size } => {
                    let statement = match client.prepare(&query).await {
                        Ok(statement) => statement,
                        Err(e) => {
                            release_units(&*client, units).await;
                            return Err(WriteError::Prepare {
                                unit: id,
                                message: e.message,
                            }
                            .into());
                        }
                    };
                    WriteUnit::Batched(BatchedWriter::new(
                        id,
                        Arc::clone(&client),
                        Arc::clone(&query),
                        Some(statement),
                        batch_size,
                    ))
                }
            };
            units.push(unit);
        }

        let id = SessionId::new();
        let coordinator = WriteCoordinator::new(
            units,
            routing,
            options.effective_channel_capacity(),
            CancellationToken::new(),
        );
        metrics::record_session();
        info!(
            session = %id,
            parallelism,
            ?strategy,
            ?routing,
            "Write session opened"
        );

        Ok(Self {
            id,
            client,
            coordinator,
            width: context.columns.len(),
            query,
            strategy,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn strategy(&self) -> WriteStrategy {
        self.strategy
    }

    pub fn rows_submitted(&self) -> u64 {
        self.coordinator.rows_submitted()
    }

    /// Submits one row; it must have exactly one value per column.
    pub async fn submit(&mut self, row: Row) -> Result<(), StateError> {
        if row.len() != self.width {
            return Err(StateError::RowWidth {
                expected: self.width,
                actual: row.len(),
            });
        }
        self.coordinator.submit(row).await
    }

    /// Stops the session. Flushes already running complete, held rows are
    /// discarded and later submits fail.
    pub fn cancel(&self) {
        if !self.coordinator.is_cancelled() {
            metrics::record_cancel();
            warn!(session = %self.id, "Write session cancelled");
        }
        self.coordinator.cancel();
    }

    /// Drains every unit, releases statements and returns the first failure.
    pub async fn close(mut self) -> Result<WriteSummary, WriteError> {
        let drained = self.coordinator.drain().await;
        release_units(&*self.client, self.coordinator.take_units()).await;

        let summary = WriteSummary {
            rows_submitted: self.coordinator.rows_submitted(),
            rows_written: self.coordinator.rows_written(),
        };
        match drained {
            Ok(()) => {
                info!(
                    session = %self.id,
                    rows_submitted = summary.rows_submitted,
                    rows_written = summary.rows_written,
                    "Write session closed"
                );
                Ok(summary)
            }
            Err(err) => {
                warn!(
                    session = %self.id,
                    failures = self.coordinator.failure_count(),
                    error = %err,
                    "Write session closed with failures"
                );
                Err(err)
            }
        }
    }
}

async fn release_units<C: RemoteClient>(client: &C, units: Vec<WriteUnit<C>>) {
    let mut released = 0usize;
    for unit in units {
        if let Some(statement) = unit.close().await {
            client.release(statement).await;
            released += 1;
        }
    }
    debug!(released, "Session statements released");
}
