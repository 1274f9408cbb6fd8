// SPDX-License-Identifier: Apache-2.0

//! Write coordinator.
//!
//! Owns the write units of one session and routes submitted rows to them.
//! With a single unit, flushes run inline on the submitting task. With more,
//! every unit is moved into its own worker task and fed through a bounded
//! channel; a unit is only ever touched by its worker, so no write-path state
//! is shared between units.
//!
//! Each accepted row gets the next submission index, which travels with it
//! to whatever unit writes it and is the row number reported in errors.
//!
//! The first failure reported by any unit is remembered. Submission keeps
//! going so in-flight work can drain, and [`WriteCoordinator::drain`]
//! reports that first failure even if every later flush succeeded.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use fedbridge_core::{RemoteClient, Row, StateError, WriteError};
use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::metrics;

use super::routing::{Route, Router, RoutingPolicy};
use super::unit::WriteUnit;

/// A row tagged with its submission index.
type Sequenced = (u64, Row);

/// First failure plus a running count of all failures.
#[derive(Debug, Default)]
struct FailureLog {
    first: OnceLock<WriteError>,
    count: AtomicU64,
}

impl FailureLog {
    fn record(&self, err: WriteError) {
        self.count.fetch_add(1, Ordering::Relaxed);
        warn!(unit = err.unit(), error = %err, "Write unit reported a failure");
        if let Err(later) = self.first.set(err) {
            debug!(error = %later, "Failure recorded after the first one");
        }
    }

    fn first(&self) -> Option<WriteError> {
        self.first.get().cloned()
    }
}

/// Counters and failures shared between the coordinator and its workers.
#[derive(Debug, Default)]
struct Shared {
    failures: FailureLog,
    rows_written: AtomicU64,
}

struct Worker<C: RemoteClient> {
    tx: mpsc::Sender<Sequenced>,
    handle: JoinHandle<WriteUnit<C>>,
}

enum Dispatch<C: RemoteClient> {
    Inline(WriteUnit<C>),
    Pooled(Vec<Worker<C>>),
    Drained(Vec<WriteUnit<C>>),
}

pub struct WriteCoordinator<C: RemoteClient> {
    dispatch: Dispatch<C>,
    router: Router,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    rows_submitted: u64,
}

impl<C: RemoteClient> WriteCoordinator<C> {
    /// Takes ownership of `units`. Unit `i` must report failures as unit `i`.
    ///
    /// More than one unit spawns one worker task per unit on the current
    /// tokio runtime, each fed by a channel holding `channel_capacity` rows.
    pub fn new(
        units: Vec<WriteUnit<C>>,
        policy: RoutingPolicy,
        channel_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        let router = Router::new(policy, units.len());

        let dispatch = if units.len() == 1 {
            let mut units = units;
            match units.pop() {
                Some(unit) => Dispatch::Inline(unit),
                None => Dispatch::Drained(Vec::new()),
            }
        } else if units.is_empty() {
            Dispatch::Drained(Vec::new())
        } else {
            let workers = units
                .into_iter()
                .enumerate()
                .map(|(id, unit)| {
                    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
                    let handle = tokio::spawn(run_worker(
                        id,
                        unit,
                        rx,
                        cancel.clone(),
                        Arc::clone(&shared),
                    ));
                    Worker { tx, handle }
                })
                .collect();
            Dispatch::Pooled(workers)
        };

        Self {
            dispatch,
            router,
            shared,
            cancel,
            rows_submitted: 0,
        }
    }

    /// Hands `row` to a unit. Waits while every eligible unit is busy.
    ///
    /// The row's submission index is the number of rows accepted before it.
    /// Only contract violations are returned here; remote failures are
    /// reported by [`WriteCoordinator::drain`].
    pub async fn submit(&mut self, row: Row) -> Result<(), StateError> {
        if self.cancel.is_cancelled() {
            return Err(StateError::Cancelled);
        }
        if row.is_empty() {
            return Err(StateError::EmptyRow);
        }
        let seq = self.rows_submitted;

        match &mut self.dispatch {
            Dispatch::Drained(_) => return Err(StateError::Closed),
            Dispatch::Inline(unit) => {
                unit.supply(seq, row)?;
                if unit.needs_flush() {
                    flush_unit(0, unit, &self.shared).await;
                }
            }
            Dispatch::Pooled(workers) => {
                let target = match self.router.route(&row) {
                    Route::Pinned(unit) => unit,
                    Route::AnyFrom(start) => {
                        let mut item = (seq, row);
                        for offset in 0..workers.len() {
                            let unit = (start + offset) % workers.len();
                            match workers[unit].tx.try_send(item) {
                                Ok(()) => {
                                    self.router.landed(unit);
                                    self.rows_submitted += 1;
                                    return Ok(());
                                }
                                Err(TrySendError::Full(back)) => item = back,
                                Err(TrySendError::Closed(_)) => return Err(StateError::WorkerGone { unit }),
                            }
                        }
                        // Every unit is busy: wait for the preferred one.
                        send_blocking(&workers[start].tx, item, start, &self.cancel).await?;
                        self.router.landed(start);
                        self.rows_submitted += 1;
                        return Ok(());
                    }
                };
                send_blocking(&workers[target].tx, (seq, row), target, &self.cancel).await?;
            }
        }

        self.rows_submitted += 1;
        Ok(())
    }

    /// Waits for all outstanding flushes and returns the first failure.
    ///
    /// Rows still held by a unit are written first unless the session was
    /// cancelled, in which case they are discarded. Further submits fail with
    /// [`StateError::Closed`].
    pub async fn drain(&mut self) -> Result<(), WriteError> {
        let dispatch = std::mem::replace(&mut self.dispatch, Dispatch::Drained(Vec::new()));
        let units = match dispatch {
            Dispatch::Inline(mut unit) => {
                finish_unit(0, &mut unit, &self.cancel, &self.shared).await;
                vec![unit]
            }
            Dispatch::Pooled(workers) => {
                let (senders, handles): (Vec<_>, Vec<_>) =
                    workers.into_iter().map(|w| (w.tx, w.handle)).unzip();
                // Closing the channels lets each worker finish its queue and exit.
                drop(senders);

                let mut units = Vec::with_capacity(handles.len());
                for (unit, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
                    match joined {
                        Ok(finished) => units.push(finished),
                        // Flush panics are caught inside the worker, so the unit
                        // is only lost (and its statement left unreleased) when
                        // the task itself is aborted or panics elsewhere.
                        Err(e) => {
                            error!(unit, error = %e, "Write worker did not finish cleanly");
                            self.shared.failures.record(WriteError::WorkerPanicked {
                                unit,
                                message: e.to_string(),
                            });
                        }
                    }
                }
                units
            }
            Dispatch::Drained(units) => units,
        };
        self.dispatch = Dispatch::Drained(units);

        match self.shared.failures.first() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Units handed back after [`WriteCoordinator::drain`], for the caller to close.
    pub fn take_units(&mut self) -> Vec<WriteUnit<C>> {
        match &mut self.dispatch {
            Dispatch::Drained(units) => std::mem::take(units),
            _ => Vec::new(),
        }
    }

    /// Stops accepting rows. In-flight flushes still complete.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn routing(&self) -> RoutingPolicy {
        self.router.policy()
    }

    pub fn rows_submitted(&self) -> u64 {
        self.rows_submitted
    }

    pub fn rows_written(&self) -> u64 {
        self.shared.rows_written.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.shared.failures.count.load(Ordering::Relaxed)
    }
}

async fn send_blocking(
    tx: &mpsc::Sender<Sequenced>,
    item: Sequenced,
    unit: usize,
    cancel: &CancellationToken,
) -> Result<(), StateError> {
    tokio::select! {
        sent = tx.send(item) => sent.map_err(|_| StateError::WorkerGone { unit }),
        _ = cancel.cancelled() => Err(StateError::Cancelled),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown cause".to_string()
    }
}

/// Runs one flush. A panic inside the remote client is turned into a
/// [`WriteError::WorkerPanicked`] so the unit survives to be closed.
async fn flush_unit<C: RemoteClient>(id: usize, unit: &mut WriteUnit<C>, shared: &Shared) {
    let start = Instant::now();
    let result = match AssertUnwindSafe(unit.flush()).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(WriteError::WorkerPanicked {
            unit: id,
            message: panic_message(payload.as_ref()),
        }),
    };
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(rows) => {
            metrics::record_flush(rows, elapsed_ms, true);
            shared.rows_written.fetch_add(rows as u64, Ordering::Relaxed);
        }
        Err(err) => {
            metrics::record_flush(0, elapsed_ms, false);
            shared.failures.record(err);
        }
    }
    debug!(unit = id, elapsed_ms, "Flush finished");
}

/// Final flush of a partial group, or discard after cancellation.
async fn finish_unit<C: RemoteClient>(
    id: usize,
    unit: &mut WriteUnit<C>,
    cancel: &CancellationToken,
    shared: &Shared,
) {
    if !unit.has_pending() {
        return;
    }
    if cancel.is_cancelled() {
        warn!(unit = id, "Discarding unflushed rows after cancellation");
        return;
    }
    flush_unit(id, unit, shared).await;
}

async fn run_worker<C: RemoteClient>(
    id: usize,
    mut unit: WriteUnit<C>,
    mut rx: mpsc::Receiver<Sequenced>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
) -> WriteUnit<C> {
    loop {
        let (seq, row) = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        if let Err(err) = unit.supply(seq, row) {
            shared.failures.record(WriteError::Rejected {
                unit: id,
                row: seq,
                message: err.to_string(),
            });
            continue;
        }
        if unit.needs_flush() {
            flush_unit(id, &mut unit, &shared).await;
        }
    }

    finish_unit(id, &mut unit, &cancel, &shared).await;
    debug!(unit = id, "Write worker stopped");
    unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fedbridge_core::{ExecutionOutcome, RemoteError, Value};

    use crate::write::unit::{BatchedWriter, SingleRowWriter};

    #[derive(Default)]
    struct RecordingClient {
        seen: Mutex<Vec<i64>>,
        fail_on: Option<i64>,
        panic_on: Option<i64>,
        released: AtomicUsize,
    }

    #[async_trait]
    impl RemoteClient for RecordingClient {
        type Statement = ();

        async fn prepare(&self, _query: &str) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn execute(&self, _statement: &mut (), rows: &[Row]) -> Result<ExecutionOutcome, RemoteError> {
            for row in rows {
                if let Some(Value::Int(id)) = row.values.first() {
                    if Some(*id) == self.panic_on {
                        panic!("driver bug on row {id}");
                    }
                    if Some(*id) == self.fail_on {
                        return Err(RemoteError::new(format!("row {id} rejected")));
                    }
                    self.seen.lock().unwrap().push(*id);
                }
            }
            Ok(ExecutionOutcome::affected(rows.len() as u64))
        }

        async fn release(&self, _statement: ()) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn single_units(client: &Arc<RecordingClient>, n: usize) -> Vec<WriteUnit<RecordingClient>> {
        (0..n)
            .map(|id| {
                WriteUnit::SingleRow(SingleRowWriter::new(id, Arc::clone(client), Arc::from("q"), None))
            })
            .collect()
    }

    fn batched_units(client: &Arc<RecordingClient>, n: usize, batch_size: usize) -> Vec<WriteUnit<RecordingClient>> {
        (0..n)
            .map(|id| {
                WriteUnit::Batched(BatchedWriter::new(id, Arc::clone(client), Arc::from("q"), Some(()), batch_size))
            })
            .collect()
    }

    fn row(id: i64) -> Row {
        Row::new(vec![Value::Int(id)])
    }

    #[tokio::test]
    async fn test_inline_coordinator_writes_every_row() {
        let client = Arc::new(RecordingClient::default());
        let mut coordinator = WriteCoordinator::new(
            single_units(&client, 1),
            RoutingPolicy::RoundRobin,
            1,
            CancellationToken::new(),
        );
        for id in 0..4 {
            coordinator.submit(row(id)).await.unwrap();
        }
        assert!(coordinator.drain().await.is_ok());
        assert_eq!(*client.seen.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(coordinator.rows_written(), 4);
        assert_eq!(coordinator.take_units().len(), 1);
    }

    #[tokio::test]
    async fn test_inline_coordinator_flushes_partial_batch_on_drain() {
        let client = Arc::new(RecordingClient::default());
        let unit = WriteUnit::Batched(BatchedWriter::new(0, Arc::clone(&client), Arc::from("q"), None, 10));
        let mut coordinator =
            WriteCoordinator::new(vec![unit], RoutingPolicy::RoundRobin, 1, CancellationToken::new());
        for id in 0..3 {
            coordinator.submit(row(id)).await.unwrap();
        }
        assert!(client.seen.lock().unwrap().is_empty());
        coordinator.drain().await.unwrap();
        assert_eq!(*client.seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pooled_coordinator_keeps_first_error_and_finishes_other_rows() {
        let client = Arc::new(RecordingClient {
            fail_on: Some(3),
            ..Default::default()
        });
        let mut coordinator = WriteCoordinator::new(
            single_units(&client, 2),
            RoutingPolicy::RoundRobin,
            1,
            CancellationToken::new(),
        );
        for id in 0..8 {
            coordinator.submit(row(id)).await.unwrap();
        }
        let err = coordinator.drain().await.unwrap_err();
        assert!(matches!(err, WriteError::Execute { ref message, .. } if message == "row 3 rejected"));

        let mut seen = client.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 4, 5, 6, 7]);
        assert_eq!(coordinator.failure_count(), 1);
        assert_eq!(coordinator.rows_submitted(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pooled_failure_reports_the_submission_index() {
        for failing in [1, 4, 6] {
            let client = Arc::new(RecordingClient {
                fail_on: Some(failing),
                ..Default::default()
            });
            let mut coordinator = WriteCoordinator::new(
                single_units(&client, 2),
                RoutingPolicy::RoundRobin,
                1,
                CancellationToken::new(),
            );
            // Row ids equal their submission index.
            for id in 0..7 {
                coordinator.submit(row(id)).await.unwrap();
            }
            match coordinator.drain().await.unwrap_err() {
                WriteError::Execute { row, .. } => assert_eq!(row, failing as u64),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_flush_keeps_the_unit_for_release() {
        let client = Arc::new(RecordingClient {
            panic_on: Some(2),
            ..Default::default()
        });
        let mut coordinator = WriteCoordinator::new(
            batched_units(&client, 2, 2),
            RoutingPolicy::RoundRobin,
            1,
            CancellationToken::new(),
        );
        for id in 0..6 {
            coordinator.submit(row(id)).await.unwrap();
        }
        let err = coordinator.drain().await.unwrap_err();
        assert!(matches!(err, WriteError::WorkerPanicked { ref message, .. } if message == "driver bug on row 2"));

        // Both units come back with their caller-provided statements.
        let units = coordinator.take_units();
        assert_eq!(units.len(), 2);
        for unit in units {
            assert_eq!(unit.close().await, Some(()));
        }
        assert_eq!(client.released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_after_drain_or_cancel_is_rejected() {
        let client = Arc::new(RecordingClient::default());
        let mut coordinator = WriteCoordinator::new(
            single_units(&client, 1),
            RoutingPolicy::RoundRobin,
            1,
            CancellationToken::new(),
        );
        coordinator.drain().await.unwrap();
        assert_eq!(coordinator.submit(row(1)).await, Err(StateError::Closed));

        let mut cancelled = WriteCoordinator::new(
            single_units(&client, 2),
            RoutingPolicy::RoundRobin,
            1,
            CancellationToken::new(),
        );
        cancelled.cancel();
        assert_eq!(cancelled.submit(row(1)).await, Err(StateError::Cancelled));
        assert!(cancelled.drain().await.is_ok());
        assert_eq!(cancelled.take_units().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_rows_are_rejected_before_routing() {
        let client = Arc::new(RecordingClient::default());
        let mut coordinator = WriteCoordinator::new(
            single_units(&client, 2),
            RoutingPolicy::RoundRobin,
            1,
            CancellationToken::new(),
        );
        assert_eq!(coordinator.submit(Row::new(vec![])).await, Err(StateError::EmptyRow));
        assert_eq!(coordinator.rows_submitted(), 0);
        coordinator.drain().await.unwrap();
    }

    #[test]
    fn test_panic_message_reads_common_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&42u8), "unknown cause");
    }
}
