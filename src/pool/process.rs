// src/pool/process.rs

//! Worker pool that runs the configured command once per job.
//!
//! Each of the `num_workers` slots runs at most one process at a time. The
//! job body is written to the process's stdin; whatever it prints on stdout
//! becomes the response payload. A non-zero exit status is a failed job.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info};

use super::{
    BoxFuture, Payload, PoolError, PoolProvider, ResultReceiver, WorkerPool, WorkerState,
    WorkerStatus,
};
use crate::config::PoolConfig;

struct Slot {
    pid: Option<u32>,
    status: WorkerStatus,
    num_execs: u64,
    /// Kills the running process when fired (used by `reset`).
    cancel: Option<oneshot::Sender<()>>,
}

impl Slot {
    fn ready(num_execs: u64) -> Self {
        Self {
            pid: None,
            status: WorkerStatus::Ready,
            num_execs,
            cancel: None,
        }
    }
}

pub struct ProcessPool {
    cfg: PoolConfig,
    tags: BTreeMap<String, String>,
    permits: Semaphore,
    slots: Mutex<Vec<Slot>>,
    generation: AtomicU64,
    /// Process table used to read worker memory.
    system: Mutex<System>,
}

impl fmt::Debug for ProcessPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessPool")
            .field("command", &self.cfg.command)
            .field("num_workers", &self.cfg.num_workers)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl ProcessPool {
    pub fn new(cfg: PoolConfig, tags: BTreeMap<String, String>) -> Result<Self, PoolError> {
        if cfg.command.trim().is_empty() {
            return Err(PoolError::Spawn("pool.command is empty".to_string()));
        }

        let num_workers = cfg.num_workers.max(1);
        let slots = (0..num_workers).map(|_| Slot::ready(0)).collect();

        Ok(Self {
            cfg,
            tags,
            permits: Semaphore::new(num_workers),
            slots: Mutex::new(slots),
            generation: AtomicU64::new(0),
            system: Mutex::new(System::new_with_specifics(RefreshKind::nothing())),
        })
    }

    /// Number of completed resets.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn lock_slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim_slot(&self) -> Result<SlotGuard<'_>, PoolError> {
        let generation = self.generation();
        let mut slots = self.lock_slots();
        let index = slots
            .iter()
            .position(|s| s.status == WorkerStatus::Ready)
            .ok_or(PoolError::NoFreeWorkers(self.cfg.allocate_timeout()))?;
        slots[index].status = WorkerStatus::Working;

        Ok(SlotGuard {
            pool: self,
            index,
            generation,
        })
    }

    /// Build a shell command appropriate for the platform.
    fn shell_command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cfg.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cfg.command);
            c
        };

        cmd.envs(&self.tags)
            .envs(&self.cfg.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run_job(&self, payload: Payload) -> Result<ResultReceiver, PoolError> {
        let allocate_timeout = self.cfg.allocate_timeout();
        let _permit = tokio::time::timeout(allocate_timeout, self.permits.acquire())
            .await
            .map_err(|_| PoolError::NoFreeWorkers(allocate_timeout))?
            .map_err(|_| PoolError::Closed)?;

        let slot = self.claim_slot()?;

        let mut child = self
            .shell_command()
            .spawn()
            .map_err(|e| PoolError::Spawn(format!("{}: {e}", self.cfg.command)))?;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        slot.started(child.id(), cancel_tx);
        debug!(pid = ?child.id(), slot = slot.index, "worker process started");

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(&payload.body).await {
                // The worker may legitimately exit without reading its input.
                if err.kind() != io::ErrorKind::BrokenPipe {
                    return Err(err.into());
                }
                debug!(slot = slot.index, "worker closed stdin before reading the payload");
            }
            // Dropping stdin closes the pipe so the worker sees EOF.
        }

        let output = tokio::select! {
            out = child.wait_with_output() => out?,
            _ = cancel_rx => {
                debug!(slot = slot.index, "worker process killed by pool reset");
                return Err(PoolError::Closed);
            }
        };

        if !output.stderr.is_empty() {
            debug!(
                slot = slot.index,
                "worker stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }

        if !output.status.success() {
            return Err(PoolError::WorkerFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(1);
        // Fresh channel with capacity 1: this send cannot fail.
        let _ = tx.try_send(Payload::raw(output.stdout));
        Ok(rx)
    }
}

impl WorkerPool for ProcessPool {
    fn exec(&self, payload: Payload) -> BoxFuture<'_, Result<ResultReceiver, PoolError>> {
        Box::pin(self.run_job(payload))
    }

    fn reset(&self) -> BoxFuture<'_, Result<(), PoolError>> {
        Box::pin(async move {
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let mut slots = self.lock_slots();
            let mut killed = 0usize;
            for slot in slots.iter_mut() {
                if let Some(cancel) = slot.cancel.take() {
                    let _ = cancel.send(());
                    killed += 1;
                }
                *slot = Slot::ready(slot.num_execs);
            }
            info!(generation, killed, workers = slots.len(), "process pool reset");
            Ok(())
        })
    }

    fn workers(&self) -> Vec<WorkerState> {
        let mut workers: Vec<WorkerState> = self
            .lock_slots()
            .iter()
            .map(|slot| WorkerState {
                pid: slot.pid.unwrap_or(0),
                status: slot.status,
                num_execs: slot.num_execs,
                memory_usage: 0,
            })
            .collect();

        let pids: Vec<Pid> = workers
            .iter()
            .filter(|w| w.pid != 0)
            .map(|w| Pid::from_u32(w.pid))
            .collect();
        if pids.is_empty() {
            return workers;
        }

        let mut system = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        for worker in workers.iter_mut().filter(|w| w.pid != 0) {
            worker.memory_usage = system
                .process(Pid::from_u32(worker.pid))
                .map(|p| p.memory())
                .unwrap_or(0);
        }
        workers
    }
}

/// Marks a slot busy for the lifetime of one job and frees it on drop.
struct SlotGuard<'a> {
    pool: &'a ProcessPool,
    index: usize,
    generation: u64,
}

impl SlotGuard<'_> {
    fn started(&self, pid: Option<u32>, cancel: oneshot::Sender<()>) {
        let mut slots = self.pool.lock_slots();
        if self.pool.generation() == self.generation {
            let slot = &mut slots[self.index];
            slot.pid = pid;
            slot.cancel = Some(cancel);
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.pool.lock_slots();
        // A reset in between already returned the slot to `Ready`.
        if self.pool.generation() == self.generation {
            let slot = &mut slots[self.index];
            *slot = Slot::ready(slot.num_execs + 1);
        }
    }
}

/// Pool provider that builds [`ProcessPool`]s.
#[derive(Debug, Clone, Default)]
pub struct ProcessPoolProvider;

impl PoolProvider for ProcessPoolProvider {
    fn new_pool(
        &self,
        cfg: PoolConfig,
        tags: BTreeMap<String, String>,
    ) -> BoxFuture<'_, Result<Box<dyn WorkerPool>, PoolError>> {
        Box::pin(async move {
            let pool = ProcessPool::new(cfg, tags)?;
            info!(
                command = %pool.cfg.command,
                workers = pool.cfg.num_workers.max(1),
                "process pool created"
            );
            Ok(Box::new(pool) as Box<dyn WorkerPool>)
        })
    }
}
