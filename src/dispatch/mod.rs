// src/dispatch/mod.rs

//! Event-to-job dispatch.
//!
//! - [`gate`] protects the pool handle against resets during a submission.
//! - [`submitter`] runs one job under a deadline and classifies the answer.
//! - [`processor`] optionally fans submissions out over a bounded queue.
//!
//! [`Dispatcher`] strings these together for a single accepted event and
//! keeps the counters honest: every event it sees increments `events` once
//! and exactly one of `jobs_ok` / `jobs_err`.

pub mod gate;
pub mod processor;
pub mod submitter;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::metrics::Counters;
use crate::watch::event::WatchEvent;
use crate::watch::normalize::Normalizer;

pub use gate::DispatchGate;
pub use processor::Processor;
pub use submitter::{DispatchError, DispatchResult, JobSubmitter, RejectReason};

#[derive(Debug)]
pub struct Dispatcher {
    normalizer: Normalizer,
    submitter: JobSubmitter,
    gate: Arc<DispatchGate>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(
        normalizer: Normalizer,
        submitter: JobSubmitter,
        gate: Arc<DispatchGate>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            normalizer,
            submitter,
            gate,
            counters,
        }
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Normalize, submit and count one accepted event.
    pub async fn dispatch(&self, event: WatchEvent) -> DispatchResult {
        let start = Instant::now();
        self.counters.count_event();

        let result = match self.normalizer.normalize(&event) {
            Err(err) => DispatchResult::Err(err.into()),
            Ok(payload) => {
                debug!(%payload, "sending event");

                // Held until the job is classified so a reset cannot swap
                // the pool underneath it.
                let pool = self.gate.shared().await;
                match pool.as_ref() {
                    Some(pool) => self.submitter.submit(pool.as_ref(), payload).await,
                    None => DispatchResult::Err(DispatchError::NoPool),
                }
            }
        };

        self.record(&event, &result, start);
        result
    }

    fn record(&self, event: &WatchEvent, result: &DispatchResult, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            DispatchResult::Ok(_) => {
                self.counters.count_job_ok();
                debug!(
                    path = ?event.path,
                    elapsed_ms,
                    "notification was processed successfully"
                );
            }
            DispatchResult::Err(err) => {
                self.counters.count_job_err();
                error!(
                    path = ?event.path,
                    elapsed_ms,
                    error = %err,
                    "notification processed with errors"
                );
            }
            DispatchResult::Rejected(reason) => {
                self.counters.count_job_err();
                warn!(
                    path = ?event.path,
                    elapsed_ms,
                    reason = reason.as_str(),
                    "worker response rejected"
                );
            }
        }
    }
}
