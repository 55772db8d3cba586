// src/dispatch/gate.rs

//! Reader/writer gate around the active worker pool.
//!
//! Every submission holds the shared side for the whole `exec` call; pool
//! installation and reset hold the exclusive side. Tokio's `RwLock` is
//! write-preferring, so once a reset is waiting no new submission can start
//! until it finishes.

use std::fmt;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::pool::{WorkerPool, WorkerState};

pub type PoolSlot = Option<Box<dyn WorkerPool>>;

/// Owner of the one pool handle. Nothing else keeps a long-lived reference
/// to the pool; every access goes through [`DispatchGate::shared`] or
/// [`DispatchGate::exclusive`].
pub struct DispatchGate {
    pool: RwLock<PoolSlot>,
}

impl fmt::Debug for DispatchGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchGate").finish_non_exhaustive()
    }
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchGate {
    /// A gate with no pool installed yet.
    pub fn new() -> Self {
        Self {
            pool: RwLock::new(None),
        }
    }

    pub fn with_pool(pool: Box<dyn WorkerPool>) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
        }
    }

    /// Shared slot for one dispatch.
    pub async fn shared(&self) -> RwLockReadGuard<'_, PoolSlot> {
        self.pool.read().await
    }

    /// Exclusive access for pool replacement or reset.
    pub async fn exclusive(&self) -> RwLockWriteGuard<'_, PoolSlot> {
        self.pool.write().await
    }

    /// Swap in a new pool, returning the previous one.
    pub async fn install(&self, pool: Box<dyn WorkerPool>) -> PoolSlot {
        let mut guard = self.exclusive().await;
        guard.replace(pool)
    }

    pub async fn is_installed(&self) -> bool {
        self.shared().await.is_some()
    }

    pub async fn workers(&self) -> Vec<WorkerState> {
        self.shared()
            .await
            .as_ref()
            .map(|pool| pool.workers())
            .unwrap_or_default()
    }

    /// Non-blocking worker snapshot for synchronous callers (the metrics
    /// collector). Empty while a reset holds the gate.
    pub fn try_workers(&self) -> Vec<WorkerState> {
        match self.pool.try_read() {
            Ok(guard) => guard
                .as_ref()
                .map(|pool| pool.workers())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}
