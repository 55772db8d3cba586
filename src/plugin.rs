// src/plugin.rs

//! Host-facing lifecycle: init → serve → (reset)* → stop.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument, Span};

use crate::config::{validate_config, Configurer, FileWatchConfig, ValidatedConfig, PLUGIN_NAME};
use crate::dispatch::{DispatchGate, Dispatcher, JobSubmitter, Processor};
use crate::errors::{Result, WatchpoolError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::metrics::{CounterSnapshot, Counters, StatsExporter};
use crate::pool::{PoolError, PoolProvider, WorkerState, WorkerStatus, MODE_FILE_WATCH, MODE_TAG};
use crate::signal::StopSignal;
use crate::watch::{EventFilter, Listener, LoopState, Normalizer, SourceOptions, WatchSource};

/// Health as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Unavailable,
}

impl Status {
    /// HTTP status code equivalent.
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Unavailable => 503,
        }
    }
}

pub struct Plugin {
    cfg: FileWatchConfig,
    provider: Arc<dyn PoolProvider>,
    fs: Arc<dyn FileSystem>,
    gate: Arc<DispatchGate>,
    counters: Arc<Counters>,
    stop: StopSignal,
    state: Arc<watch::Sender<LoopState>>,
    /// Set by the one `serve` call allowed to start the loop.
    serving: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
    span: Span,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("dir", &self.cfg.dir)
            .field("state", &self.state())
            .field("counters", &self.counters())
            .finish_non_exhaustive()
    }
}

impl Plugin {
    /// Read the `[file_watch]` section.
    ///
    /// Returns [`WatchpoolError::Disabled`] when the section is absent.
    /// Directory and pattern checks happen in [`Plugin::serve`].
    pub fn init(cfg: &impl Configurer, provider: Arc<dyn PoolProvider>) -> Result<Self> {
        if !cfg.has(PLUGIN_NAME) {
            return Err(WatchpoolError::Disabled(PLUGIN_NAME.to_string()));
        }

        let config: FileWatchConfig = cfg.unmarshal_key(PLUGIN_NAME)?;
        Ok(Self::from_config(config, provider))
    }

    /// Build a plugin from an already-parsed config.
    pub fn from_config(mut config: FileWatchConfig, provider: Arc<dyn PoolProvider>) -> Self {
        config.init_defaults();
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            cfg: config,
            provider,
            fs: Arc::new(RealFileSystem),
            gate: Arc::new(DispatchGate::new()),
            counters: Arc::new(Counters::new()),
            stop: StopSignal::new(),
            state: Arc::new(state),
            serving: AtomicBool::new(false),
            listener: Mutex::new(None),
            span: info_span!("plugin", name = PLUGIN_NAME),
        }
    }

    /// Validate directories against `fs` instead of the real filesystem.
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn config(&self) -> &FileWatchConfig {
        &self.cfg
    }

    /// Validate, create the pool and start the watch loop.
    ///
    /// Startup failures arrive on the returned channel. The channel closes
    /// when the watch loop exits.
    pub async fn serve(&self) -> mpsc::Receiver<WatchpoolError> {
        let (err_tx, err_rx) = mpsc::channel(1);

        if self.serving.swap(true, Ordering::SeqCst) {
            let _ = err_tx.try_send(WatchpoolError::ConfigError("already serving".to_string()));
            return err_rx;
        }

        match self.start(err_tx.clone()).await {
            Ok(handle) => {
                *self.lock_listener() = Some(handle);
            }
            Err(err) => {
                // A failed start leaves the plugin servable again.
                self.serving.store(false, Ordering::SeqCst);
                // Capacity 1 and nothing sent yet.
                let _ = err_tx.try_send(err);
            }
        }

        err_rx
    }

    async fn start(&self, err_tx: mpsc::Sender<WatchpoolError>) -> Result<JoinHandle<()>> {
        let ValidatedConfig {
            config,
            root,
            filter,
        } = validate_config(self.cfg.clone(), self.fs.as_ref())?;

        let tags = BTreeMap::from([(MODE_TAG.to_string(), MODE_FILE_WATCH.to_string())]);
        let pool = self.provider.new_pool(config.pool.clone(), tags).await?;
        if self.gate.install(pool).await.is_some() {
            debug!("replaced a previously installed pool");
        }

        debug!(dir = %config.dir, regexp = %config.regexp, "starting watching");
        let source = WatchSource::start(
            &root,
            SourceOptions {
                backend: config.backend,
                poll_interval: config.poll_interval,
                recursive: config.recursive,
            },
        )?;

        Ok(self.spawn_listener(&config, filter, source, err_tx))
    }

    fn spawn_listener(
        &self,
        config: &FileWatchConfig,
        filter: EventFilter,
        source: WatchSource,
        err_tx: mpsc::Sender<WatchpoolError>,
    ) -> JoinHandle<()> {
        let dispatcher = Arc::new(Dispatcher::new(
            Normalizer::new(config.dir.clone(), config.payload),
            JobSubmitter::new(config.job_timeout),
            Arc::clone(&self.gate),
            Arc::clone(&self.counters),
        ));

        let mut listener = Listener::new(
            filter,
            Arc::clone(&dispatcher),
            self.stop.clone(),
            Arc::clone(&self.state),
        );

        if config.max_concurrency > 1 {
            let processor = self.span.in_scope(|| {
                Processor::new(dispatcher, config.max_concurrency, config.queue_length)
            });
            listener = listener.with_processor(processor);
        }

        tokio::spawn(
            async move {
                listener.run(source).await;
                // Keeps the error channel open for as long as the loop runs.
                drop(err_tx);
            }
            .instrument(self.span.clone()),
        )
    }

    /// Reset the worker pool. In-flight jobs finish first; new jobs wait
    /// until the reset is done. Concurrent resets run one after another.
    pub async fn reset(&self) -> Result<()> {
        let pool = self.gate.exclusive().await;
        info!(plugin = PLUGIN_NAME, "reset signal was received");

        let Some(pool) = pool.as_ref() else {
            return Err(PoolError::Closed.into());
        };
        pool.reset().await?;

        info!(plugin = PLUGIN_NAME, "plugin was successfully reset");
        Ok(())
    }

    /// Stop the watch loop and wait for it to exit. Safe to call repeatedly.
    ///
    /// Before `serve` this does nothing, so a later `serve` still starts.
    pub async fn stop(&self) -> Result<()> {
        if !self.serving.load(Ordering::SeqCst) {
            debug!(plugin = PLUGIN_NAME, "stop before serve; nothing to stop");
            return Ok(());
        }
        if !self.stop.fire() {
            debug!(plugin = PLUGIN_NAME, "stop already requested");
            return Ok(());
        }

        let handle = self.lock_listener().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                return Err(anyhow::anyhow!("watch loop task failed: {err}").into());
            }
        }
        info!(plugin = PLUGIN_NAME, "plugin stopped");
        Ok(())
    }

    pub async fn workers(&self) -> Vec<WorkerState> {
        self.gate.workers().await
    }

    /// `Ok` while at least one worker is ready or working.
    pub async fn status(&self) -> Status {
        let workers = self.workers().await;
        if workers.iter().any(|w| w.status.is_active()) {
            Status::Ok
        } else {
            Status::Unavailable
        }
    }

    /// `Ok` while at least one worker is ready to take a job.
    pub async fn ready(&self) -> Status {
        let workers = self.workers().await;
        if workers.iter().any(|w| w.status == WorkerStatus::Ready) {
            Status::Ok
        } else {
            Status::Unavailable
        }
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Resolves once the watch loop reached `Stopped`.
    pub async fn wait_stopped(&self) {
        let mut rx = self.state.subscribe();
        // `wait_for` only errors when the sender is gone, which `self` prevents.
        let _ = rx.wait_for(|s| *s == LoopState::Stopped).await;
    }

    /// Collector exposing the counters and worker gauges.
    pub fn metrics_collector(&self) -> prometheus::Result<StatsExporter> {
        StatsExporter::new(Arc::clone(&self.counters), self.gate.clone())
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
