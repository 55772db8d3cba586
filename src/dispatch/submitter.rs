// src/dispatch/submitter.rs

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::pool::{Payload, PoolError, WorkerPool};

/// Deadline applied to a single submission unless configured otherwise.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single dispatch failed.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to serialize event details: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    #[error("no worker pool installed")]
    NoPool,

    #[error(transparent)]
    Exec(#[from] PoolError),
}

/// Responses the submitter refuses to treat as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The worker answered with a partial (streamed) frame.
    StreamingUnsupported,
    /// `exec` succeeded but no result was waiting on the channel.
    EmptyResponse,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::StreamingUnsupported => "streaming-unsupported",
            RejectReason::EmptyResponse => "empty-response",
        }
    }
}

/// Outcome of one dispatch.
#[derive(Debug)]
pub enum DispatchResult {
    /// Worker acknowledged; `None` when it returned no data.
    Ok(Option<Payload>),
    Err(DispatchError),
    Rejected(RejectReason),
}

impl DispatchResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, DispatchResult::Ok(_))
    }

    /// Human-readable failure, `None` on success.
    pub fn failure(&self) -> Option<String> {
        match self {
            DispatchResult::Ok(_) => None,
            DispatchResult::Err(err) => Some(err.to_string()),
            DispatchResult::Rejected(reason) => Some(reason.as_str().to_string()),
        }
    }
}

/// Sends one payload to the pool under a deadline and classifies the answer.
///
/// No retries: a failed job is reported once and the event is done.
#[derive(Debug, Clone)]
pub struct JobSubmitter {
    deadline: Duration,
}

impl Default for JobSubmitter {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_TIMEOUT)
    }
}

impl JobSubmitter {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Must be called while holding the dispatch gate's shared slot.
    pub async fn submit(&self, pool: &dyn WorkerPool, payload: Payload) -> DispatchResult {
        let mut results = match tokio::time::timeout(self.deadline, pool.exec(payload)).await {
            Err(_elapsed) => return DispatchResult::Err(DispatchError::Timeout(self.deadline)),
            Ok(Err(err)) => return DispatchResult::Err(err.into()),
            Ok(Ok(results)) => results,
        };

        match results.try_recv() {
            Ok(response) => classify(response),
            Err(_) => DispatchResult::Rejected(RejectReason::EmptyResponse),
        }
    }
}

/// Classify a worker response.
pub fn classify(response: Payload) -> DispatchResult {
    if response.is_stream() {
        return DispatchResult::Rejected(RejectReason::StreamingUnsupported);
    }
    if response.is_empty() {
        return DispatchResult::Ok(None);
    }

    // Response bodies have no protocol yet; they are accepted and dropped.
    debug!(bytes = response.body.len(), "worker returned a response body; ignoring");
    DispatchResult::Ok(Some(response))
}
