// src/pool/mod.rs

//! Worker pool boundary.
//!
//! The dispatch engine only talks to a [`WorkerPool`] trait object: submit
//! one payload, reset, list workers. [`process`] holds the production
//! implementation that runs an external command per job; tests plug in a
//! scripted fake instead.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::PoolConfig;

pub mod payload;
pub mod process;

pub use payload::{Codec, Flags, Payload};
pub use process::{ProcessPool, ProcessPoolProvider};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Channel on which a pool delivers the result(s) of one `exec` call.
pub type ResultReceiver = mpsc::Receiver<Payload>;

/// Environment tag set on every worker started for this plugin.
pub const MODE_TAG: &str = "RR_MODE";
pub const MODE_FILE_WATCH: &str = "file_watch";

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no free workers within {0:?}")]
    NoFreeWorkers(std::time::Duration),

    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("worker exited with code {code}: {stderr}")]
    WorkerFailed { code: i32, stderr: String },

    #[error("worker io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pool is closed")]
    Closed,
}

/// Lifecycle state of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Inactive,
    Ready,
    Working,
    Invalid,
    Stopping,
    Stopped,
    Errored,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Inactive => "inactive",
            WorkerStatus::Ready => "ready",
            WorkerStatus::Working => "working",
            WorkerStatus::Invalid => "invalid",
            WorkerStatus::Stopping => "stopping",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Errored => "errored",
        }
    }

    /// Ready or working.
    pub fn is_active(&self) -> bool {
        matches!(self, WorkerStatus::Ready | WorkerStatus::Working)
    }
}

/// Point-in-time view of one worker, as reported by [`WorkerPool::workers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerState {
    /// OS process id, `0` when the slot has no live process.
    pub pid: u32,
    pub status: WorkerStatus,
    pub num_execs: u64,
    /// Resident memory in bytes.
    pub memory_usage: u64,
}

/// A set of worker processes accepting one job at a time each.
pub trait WorkerPool: Send + Sync {
    /// Submit a single job. On success the returned channel already holds
    /// the worker's response (or is empty if the pool broke its contract).
    ///
    /// Dropping the returned future abandons the job.
    fn exec(&self, payload: Payload) -> BoxFuture<'_, Result<ResultReceiver, PoolError>>;

    /// Restart the pool's workers.
    fn reset(&self) -> BoxFuture<'_, Result<(), PoolError>>;

    fn workers(&self) -> Vec<WorkerState>;
}

/// Builds worker pools from configuration (the host "server" capability).
pub trait PoolProvider: Send + Sync {
    fn new_pool(
        &self,
        cfg: PoolConfig,
        tags: BTreeMap<String, String>,
    ) -> BoxFuture<'_, Result<Box<dyn WorkerPool>, PoolError>>;
}
