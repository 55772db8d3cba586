// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{
    deserialize_duration, deserialize_opt_duration, MatchTarget, PayloadMode, WatchBackend,
};

/// Key of the plugin section in the configuration file.
pub const PLUGIN_NAME: &str = "file_watch";

/// `[file_watch]` section.
///
/// ```toml
/// [file_watch]
/// dir = "./incoming"
/// regexp = "\\.log$"
///
/// [file_watch.pool]
/// command = "php worker.php"
/// num_workers = 4
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FileWatchConfig {
    /// Worker pool settings from `[file_watch.pool]`.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Directory to watch. Required; must exist and be a directory.
    #[serde(default)]
    pub dir: String,

    /// Optional regular expression; empty means "match everything".
    #[serde(default)]
    pub regexp: String,

    /// Whether `regexp` is tested against the full path or the file name.
    #[serde(default)]
    pub match_target: MatchTarget,

    /// Also watch sub-directories of `dir`.
    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub backend: WatchBackend,

    /// Poll interval for the polling backend.
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,

    /// Deadline for a single job submission.
    #[serde(
        default = "default_job_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub job_timeout: Duration,

    #[serde(default)]
    pub payload: PayloadMode,

    /// Number of concurrent submissions. `1` keeps the watch loop strictly
    /// sequential.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Capacity of the pending-job queue used when `max_concurrency > 1`.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_job_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_concurrency() -> usize {
    1
}

fn default_queue_length() -> usize {
    100
}

impl FileWatchConfig {
    /// A config watching `dir` with every other field at its default.
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            pool: PoolConfig::default(),
            dir: dir.into(),
            regexp: String::new(),
            match_target: MatchTarget::default(),
            recursive: false,
            backend: WatchBackend::default(),
            poll_interval: default_poll_interval(),
            job_timeout: default_job_timeout(),
            payload: PayloadMode::default(),
            max_concurrency: default_max_concurrency(),
            queue_length: default_queue_length(),
        }
    }

    pub fn init_defaults(&mut self) {
        self.pool.init_defaults();
    }
}

/// `[file_watch.pool]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolConfig {
    /// Worker command, executed through the platform shell.
    #[serde(default)]
    pub command: String,

    /// Number of worker slots; `0` means "one per CPU".
    #[serde(default)]
    pub num_workers: usize,

    /// How long `exec` may wait for a free worker slot.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub allocate_timeout: Option<Duration>,

    /// Extra environment variables for every worker process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl PoolConfig {
    pub fn init_defaults(&mut self) {
        if self.num_workers == 0 {
            self.num_workers = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
        }
        if self.allocate_timeout.is_none() {
            self.allocate_timeout = Some(Duration::from_secs(60));
        }
    }

    /// Effective allocate timeout (defaults applied).
    pub fn allocate_timeout(&self) -> Duration {
        self.allocate_timeout.unwrap_or(Duration::from_secs(60))
    }
}
