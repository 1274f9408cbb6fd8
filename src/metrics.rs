// SPDX-License-Identifier: Apache-2.0

//! Lightweight in-memory write metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

#[derive(Default)]
struct WriteMetrics {
    sessions: AtomicU64,
    cancelled: AtomicU64,
    flushes: AtomicU64,
    failed_flushes: AtomicU64,
    rows_written: AtomicU64,
    flush_total_ms: AtomicU64,
    flush_max_ms: AtomicU64,
}

static WRITE_METRICS: OnceLock<WriteMetrics> = OnceLock::new();

fn metrics() -> &'static WriteMetrics {
    WRITE_METRICS.get_or_init(WriteMetrics::default)
}

pub fn record_session() {
    metrics().sessions.fetch_add(1, Ordering::Relaxed);
}

pub fn record_cancel() {
    metrics().cancelled.fetch_add(1, Ordering::Relaxed);
}

pub fn record_flush(rows: usize, duration_ms: f64, success: bool) {
    let duration_ms = duration_ms.max(0.0) as u64;
    let metrics = metrics();
    metrics.flushes.fetch_add(1, Ordering::Relaxed);
    if success {
        metrics.rows_written.fetch_add(rows as u64, Ordering::Relaxed);
    } else {
        metrics.failed_flushes.fetch_add(1, Ordering::Relaxed);
    }
    metrics.flush_total_ms.fetch_add(duration_ms, Ordering::Relaxed);
    metrics.flush_max_ms.fetch_max(duration_ms, Ordering::Relaxed);
}

#[derive(Debug, Serialize)]
pub struct WriteMetricsSnapshot {
    pub sessions: u64,
    pub cancelled: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub rows_written: u64,
    pub avg_flush_ms: Option<f64>,
    pub max_flush_ms: Option<u64>,
}

pub fn snapshot() -> WriteMetricsSnapshot {
    let metrics = metrics();
    let flushes = metrics.flushes.load(Ordering::Relaxed);
    let total_ms = metrics.flush_total_ms.load(Ordering::Relaxed);
    let max_ms = metrics.flush_max_ms.load(Ordering::Relaxed);

    WriteMetricsSnapshot {
        sessions: metrics.sessions.load(Ordering::Relaxed),
        cancelled: metrics.cancelled.load(Ordering::Relaxed),
        flushes,
        failed_flushes: metrics.failed_flushes.load(Ordering::Relaxed),
        rows_written: metrics.rows_written.load(Ordering::Relaxed),
        avg_flush_ms: if flushes > 0 {
            Some(total_ms as f64 / flushes as f64)
        } else {
            None
        },
        max_flush_ms: if max_ms > 0 { Some(max_ms) } else { None },
    }
}
