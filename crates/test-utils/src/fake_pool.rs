use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use watchpool::config::PoolConfig;
use watchpool::pool::{
    BoxFuture, Flags, Payload, PoolError, PoolProvider, ResultReceiver, WorkerPool, WorkerState,
    WorkerStatus,
};

/// What the fake pool does for one `exec` call.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Succeed with an empty body.
    Ack,
    /// Succeed with the given body.
    Respond(Vec<u8>),
    /// Succeed with a frame carrying the STREAM flag.
    Stream,
    /// Return a result channel with nothing in it.
    NoResult,
    /// Fail the job.
    Fail(String),
    /// Never finish.
    Hang,
}

#[derive(Debug)]
struct State {
    default: Mutex<Behaviour>,
    script: Mutex<VecDeque<Behaviour>>,
    received: Mutex<Vec<Payload>>,
    exec_delay: Mutex<Duration>,
    reset_delay: Mutex<Duration>,
    fail_next_reset: AtomicBool,
    resetting: AtomicBool,
    in_flight: AtomicUsize,
    resets: AtomicUsize,
    overlaps: AtomicUsize,
    num_workers: usize,
}

/// Scripted in-memory pool.
///
/// Also checks the gate discipline: an `exec` running while a `reset` is in
/// progress (or the other way round) is counted in [`FakePool::overlaps`].
#[derive(Debug, Clone)]
pub struct FakePool {
    state: Arc<State>,
}

impl Default for FakePool {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePool {
    pub fn new() -> Self {
        Self::with_default(Behaviour::Ack)
    }

    pub fn with_default(behaviour: Behaviour) -> Self {
        Self {
            state: Arc::new(State {
                default: Mutex::new(behaviour),
                script: Mutex::new(VecDeque::new()),
                received: Mutex::new(Vec::new()),
                exec_delay: Mutex::new(Duration::ZERO),
                reset_delay: Mutex::new(Duration::ZERO),
                fail_next_reset: AtomicBool::new(false),
                resetting: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                resets: AtomicUsize::new(0),
                overlaps: AtomicUsize::new(0),
                num_workers: 2,
            }),
        }
    }

    /// Queue a behaviour for the next unscripted `exec` call.
    pub fn push(&self, behaviour: Behaviour) -> &Self {
        self.state.script.lock().unwrap().push_back(behaviour);
        self
    }

    pub fn set_exec_delay(&self, delay: Duration) {
        *self.state.exec_delay.lock().unwrap() = delay;
    }

    pub fn set_reset_delay(&self, delay: Duration) {
        *self.state.reset_delay.lock().unwrap() = delay;
    }

    pub fn fail_next_reset(&self) {
        self.state.fail_next_reset.store(true, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Payload> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn received_bodies(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|p| String::from_utf8_lossy(&p.body).into_owned())
            .collect()
    }

    pub fn resets(&self) -> usize {
        self.state.resets.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.state.overlaps.load(Ordering::SeqCst)
    }

    fn next_behaviour(&self) -> Behaviour {
        let scripted = self.state.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.state.default.lock().unwrap().clone())
    }

    fn check_no_reset(&self) {
        if self.state.resetting.load(Ordering::SeqCst) {
            self.state.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Decrements the in-flight count even when the exec future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool for FakePool {
    fn exec(&self, payload: Payload) -> BoxFuture<'_, Result<ResultReceiver, PoolError>> {
        Box::pin(async move {
            let _in_flight = InFlight::enter(&self.state.in_flight);
            self.check_no_reset();
            self.state.received.lock().unwrap().push(payload);

            let behaviour = self.next_behaviour();
            let delay = *self.state.exec_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.check_no_reset();

            let (tx, rx) = mpsc::channel(1);
            match behaviour {
                Behaviour::Ack => {
                    tx.try_send(Payload::default()).unwrap();
                }
                Behaviour::Respond(body) => {
                    tx.try_send(Payload::raw(body)).unwrap();
                }
                Behaviour::Stream => {
                    tx.try_send(Payload::raw("partial").with_flags(Flags::STREAM))
                        .unwrap();
                }
                Behaviour::NoResult => {}
                Behaviour::Fail(msg) => {
                    return Err(PoolError::WorkerFailed {
                        code: 1,
                        stderr: msg,
                    });
                }
                Behaviour::Hang => loop {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                },
            }
            Ok(rx)
        })
    }

    fn reset(&self) -> BoxFuture<'_, Result<(), PoolError>> {
        Box::pin(async move {
            if self.state.in_flight.load(Ordering::SeqCst) > 0 {
                self.state.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            self.state.resetting.store(true, Ordering::SeqCst);
            let delay = *self.state.reset_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.state.resetting.store(false, Ordering::SeqCst);

            if self.state.fail_next_reset.swap(false, Ordering::SeqCst) {
                return Err(PoolError::Spawn("reset failed".to_string()));
            }
            self.state.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn workers(&self) -> Vec<WorkerState> {
        (0..self.state.num_workers)
            .map(|i| WorkerState {
                pid: 1000 + i as u32,
                status: WorkerStatus::Ready,
                num_execs: 0,
                memory_usage: 1024,
            })
            .collect()
    }
}

/// Provider handing out clones of one [`FakePool`].
#[derive(Debug, Clone, Default)]
pub struct FakePoolProvider {
    pool: FakePool,
    tags: Arc<Mutex<Option<BTreeMap<String, String>>>>,
    fail: bool,
}

impl FakePoolProvider {
    pub fn new(pool: FakePool) -> Self {
        Self {
            pool,
            tags: Arc::new(Mutex::new(None)),
            fail: false,
        }
    }

    /// Provider whose `new_pool` always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn pool(&self) -> &FakePool {
        &self.pool
    }

    /// Tags passed to the last `new_pool` call.
    pub fn tags(&self) -> Option<BTreeMap<String, String>> {
        self.tags.lock().unwrap().clone()
    }
}

impl PoolProvider for FakePoolProvider {
    fn new_pool(
        &self,
        _cfg: PoolConfig,
        tags: BTreeMap<String, String>,
    ) -> BoxFuture<'_, Result<Box<dyn WorkerPool>, PoolError>> {
        Box::pin(async move {
            if self.fail {
                return Err(PoolError::Spawn("fake provider refused".to_string()));
            }
            *self.tags.lock().unwrap() = Some(tags);
            Ok(Box::new(self.pool.clone()) as Box<dyn WorkerPool>)
        })
    }
}
