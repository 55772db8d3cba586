// src/watch/source.rs

use std::fmt;
use std::path::Path;
use std::time::Duration;

use notify::{Config, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::info;

use crate::types::WatchBackend;
use crate::watch::event::{RenameTracker, WatchEvent};

/// Settings for [`WatchSource::start`].
#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub backend: WatchBackend,
    pub poll_interval: Duration,
    pub recursive: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            backend: WatchBackend::Poll,
            poll_interval: Duration::from_millis(100),
            recursive: false,
        }
    }
}

/// Sending half of a watch source, for feeding events by hand.
#[derive(Debug, Clone)]
pub struct SourceSender {
    pub events: mpsc::UnboundedSender<WatchEvent>,
    pub errors: mpsc::UnboundedSender<notify::Error>,
}

/// The OS watch handle plus the channels it reports on.
///
/// The `notify` callback owns the sending halves, so dropping the handle
/// (or every [`SourceSender`]) closes `events`: that is the loop's "source
/// closed" signal.
pub struct WatchSource {
    pub events: mpsc::UnboundedReceiver<WatchEvent>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
    handle: Option<Box<dyn Watcher + Send>>,
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSource")
            .field("os_handle", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl WatchSource {
    /// A source with no OS handle; events come from the returned sender.
    pub fn channel() -> (SourceSender, WatchSource) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (errors_tx, errors) = mpsc::unbounded_channel();
        (
            SourceSender {
                events: events_tx,
                errors: errors_tx,
            },
            WatchSource {
                events,
                errors,
                handle: None,
            },
        )
    }

    /// Register `root` with the configured backend and start watching.
    pub fn start(root: &Path, options: SourceOptions) -> notify::Result<WatchSource> {
        let (sender, mut source) = Self::channel();

        let mut renames = RenameTracker::new();
        // Called synchronously by notify on its own thread.
        let handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for watch_event in renames.convert(event) {
                    // Receiver gone means the loop stopped; nothing to do.
                    let _ = sender.events.send(watch_event);
                }
            }
            Err(err) => {
                let _ = sender.errors.send(err);
            }
        };

        let mut handle: Box<dyn Watcher + Send> = match options.backend {
            WatchBackend::Poll => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(options.poll_interval),
            )?),
            WatchBackend::Native => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        };

        let mode = if options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        handle.watch(root, mode)?;

        info!(
            root = ?root,
            backend = ?options.backend,
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            "file watcher started"
        );

        source.handle = Some(handle);
        Ok(source)
    }

    /// Drop the OS handle. Pending events stay readable.
    pub fn close(&mut self) {
        self.handle = None;
    }
}
