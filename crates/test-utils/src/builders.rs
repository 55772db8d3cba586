#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use watchpool::config::FileWatchConfig;
use watchpool::types::{MatchTarget, PayloadMode, WatchBackend};
use watchpool::watch::{Op, WatchEvent};

/// Builder for `FileWatchConfig` to simplify test setup.
///
/// Defaults are tuned for tests: fast polling and a short job timeout.
pub struct FileWatchConfigBuilder {
    config: FileWatchConfig,
}

impl FileWatchConfigBuilder {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let mut config = FileWatchConfig::new(dir.as_ref().to_string_lossy().into_owned());
        config.poll_interval = Duration::from_millis(20);
        config.job_timeout = Duration::from_secs(1);
        Self { config }
    }

    pub fn regexp(mut self, pattern: &str) -> Self {
        self.config.regexp = pattern.to_string();
        self
    }

    pub fn match_target(mut self, target: MatchTarget) -> Self {
        self.config.match_target = target;
        self
    }

    pub fn payload(mut self, mode: PayloadMode) -> Self {
        self.config.payload = mode;
        self
    }

    pub fn backend(mut self, backend: WatchBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.config.recursive = recursive;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = timeout;
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    pub fn queue_length(mut self, n: usize) -> Self {
        self.config.queue_length = n;
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.config.pool.command = command.to_string();
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.pool.num_workers = n;
        self
    }

    pub fn build(self) -> FileWatchConfig {
        self.config
    }
}

/// Builder for `WatchEvent`.
pub struct WatchEventBuilder {
    op: Op,
    path: PathBuf,
    old_path: Option<PathBuf>,
}

impl WatchEventBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            op: Op::Write,
            path: path.into(),
            old_path: None,
        }
    }

    pub fn op(mut self, op: Op) -> Self {
        self.op = op;
        self
    }

    pub fn moved_from(mut self, old_path: impl Into<PathBuf>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }

    pub fn build(self) -> WatchEvent {
        let event = WatchEvent::new(self.op, self.path);
        match self.old_path {
            Some(old) => event.with_old_path(old),
            None => event,
        }
    }
}

/// Shorthand for a `WatchEvent` with no metadata.
pub fn event(op: Op, path: &str) -> WatchEvent {
    WatchEventBuilder::new(path).op(op).build()
}
