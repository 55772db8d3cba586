// src/metrics.rs

//! Event/job counters and their Prometheus exporter.
//!
//! # Design
//! - [`Counters`] is written by the dispatch path and read by the exporter;
//!   the three values are independent atomics, so a snapshot is not
//!   transactional across them.
//! - [`StatsExporter`] is a `prometheus` collector that reads the counters
//!   and the pool's worker list at scrape time.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::dispatch::DispatchGate;
use crate::pool::{WorkerState, WorkerStatus};

/// Metric name prefix.
pub const NAMESPACE: &str = "rr_file_watch";

#[derive(Debug, Default)]
pub struct Counters {
    events: AtomicU64,
    jobs_ok: AtomicU64,
    jobs_err: AtomicU64,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    pub events: u64,
    pub jobs_ok: u64,
    pub jobs_err: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_job_ok(&self) {
        self.jobs_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_job_err(&self) {
        self.jobs_err.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            events: self.events.load(Ordering::Relaxed),
            jobs_ok: self.jobs_ok.load(Ordering::Relaxed),
            jobs_err: self.jobs_err.load(Ordering::Relaxed),
        }
    }
}

/// Source of worker states for the exporter.
pub trait Informer: Send + Sync {
    fn workers(&self) -> Vec<WorkerState>;
}

impl Informer for DispatchGate {
    fn workers(&self) -> Vec<WorkerState> {
        self.try_workers()
    }
}

/// Worker totals by status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSummary {
    pub total: usize,
    pub ready: usize,
    pub working: usize,
    /// Every other status (invalid, stopping, errored, ...).
    pub invalid: usize,
    pub memory_bytes: u64,
}

pub fn summarize_workers(workers: &[WorkerState]) -> WorkerSummary {
    let mut summary = WorkerSummary {
        total: workers.len(),
        ..WorkerSummary::default()
    };
    for worker in workers {
        summary.memory_bytes += worker.memory_usage;
        match worker.status {
            WorkerStatus::Ready => summary.ready += 1,
            WorkerStatus::Working => summary.working += 1,
            _ => summary.invalid += 1,
        }
    }
    summary
}

/// Prometheus collector for the plugin.
pub struct StatsExporter {
    counters: Arc<Counters>,
    informer: Arc<dyn Informer>,

    events: IntGauge,
    jobs_ok: IntGauge,
    jobs_err: IntGauge,

    total_workers: IntGauge,
    total_memory: IntGauge,
    workers_ready: IntGauge,
    workers_working: IntGauge,
    workers_invalid: IntGauge,
    worker_state: IntGaugeVec,
    worker_memory: IntGaugeVec,
}

impl fmt::Debug for StatsExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsExporter")
            .field("counters", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE)
}

impl StatsExporter {
    /// # Errors
    ///
    /// Returns an error if a metric descriptor is invalid.
    pub fn new(counters: Arc<Counters>, informer: Arc<dyn Informer>) -> prometheus::Result<Self> {
        Ok(Self {
            counters,
            informer,
            events: IntGauge::with_opts(opts(
                "events",
                "Number of events registered in the directory",
            ))?,
            jobs_ok: IntGauge::with_opts(opts(
                "jobs_ok",
                "Number of successfully processed notifications",
            ))?,
            jobs_err: IntGauge::with_opts(opts(
                "jobs_err",
                "Number of notifications error while processing in the worker",
            ))?,
            total_workers: IntGauge::with_opts(opts(
                "total_workers",
                "Total number of workers used by the plugin",
            ))?,
            total_memory: IntGauge::with_opts(opts(
                "workers_memory_bytes",
                "Memory usage by workers",
            ))?,
            workers_ready: IntGauge::with_opts(opts(
                "workers_ready",
                "Workers currently in ready state",
            ))?,
            workers_working: IntGauge::with_opts(opts(
                "workers_working",
                "Workers currently in working state",
            ))?,
            workers_invalid: IntGauge::with_opts(opts(
                "workers_invalid",
                "Workers currently in invalid,killing,destroyed,errored,inactive states",
            ))?,
            worker_state: IntGaugeVec::new(
                opts("worker_state", "Worker current state"),
                &["state", "pid"],
            )?,
            worker_memory: IntGaugeVec::new(
                opts("worker_memory_bytes", "Worker current memory usage"),
                &["pid"],
            )?,
        })
    }

    fn refresh(&self) {
        let snapshot = self.counters.snapshot();
        self.events.set(clamp(snapshot.events));
        self.jobs_ok.set(clamp(snapshot.jobs_ok));
        self.jobs_err.set(clamp(snapshot.jobs_err));

        let workers = self.informer.workers();
        let summary = summarize_workers(&workers);

        // Drop label sets of workers that are gone.
        self.worker_state.reset();
        self.worker_memory.reset();
        for worker in &workers {
            let pid = worker.pid.to_string();
            self.worker_state
                .with_label_values(&[worker.status.as_str(), pid.as_str()])
                .set(0);
            self.worker_memory
                .with_label_values(&[pid.as_str()])
                .set(clamp(worker.memory_usage));
        }

        self.total_workers.set(clamp(summary.total as u64));
        self.total_memory.set(clamp(summary.memory_bytes));
        self.workers_ready.set(clamp(summary.ready as u64));
        self.workers_working.set(clamp(summary.working as u64));
        self.workers_invalid.set(clamp(summary.invalid as u64));
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl Collector for StatsExporter {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = Vec::new();
        descs.extend(self.events.desc());
        descs.extend(self.jobs_ok.desc());
        descs.extend(self.jobs_err.desc());
        descs.extend(self.total_workers.desc());
        descs.extend(self.total_memory.desc());
        descs.extend(self.workers_ready.desc());
        descs.extend(self.workers_working.desc());
        descs.extend(self.workers_invalid.desc());
        descs.extend(self.worker_state.desc());
        descs.extend(self.worker_memory.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.refresh();

        let mut families = Vec::new();
        families.extend(self.events.collect());
        families.extend(self.jobs_ok.collect());
        families.extend(self.jobs_err.collect());
        families.extend(self.total_workers.collect());
        families.extend(self.total_memory.collect());
        families.extend(self.workers_ready.collect());
        families.extend(self.workers_working.collect());
        families.extend(self.workers_invalid.collect());
        families.extend(self.worker_state.collect());
        families.extend(self.worker_memory.collect());
        families
    }
}

/// Render every collector in `registry` in the Prometheus text format.
pub fn encode_text(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .context("encoding metrics")?;
    String::from_utf8(buffer).context("metrics are not valid utf-8")
}
