// src/watch/listener.rs

//! The watch loop: filter → dispatch → count, until stopped.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch::{Dispatcher, Processor};
use crate::signal::StopSignal;
use crate::watch::event::WatchEvent;
use crate::watch::filter::EventFilter;
use crate::watch::source::WatchSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Watching,
    Stopped,
}

/// Long-lived consumer of one [`WatchSource`].
///
/// Events are handled strictly in arrival order. Without a [`Processor`]
/// each dispatch finishes before the next event is read; with one, events
/// are queued in order but may complete out of order.
#[derive(Debug)]
pub struct Listener {
    filter: EventFilter,
    dispatcher: Arc<Dispatcher>,
    processor: Option<Processor>,
    stop: StopSignal,
    state: Arc<watch::Sender<LoopState>>,
}

impl Listener {
    pub fn new(
        filter: EventFilter,
        dispatcher: Arc<Dispatcher>,
        stop: StopSignal,
        state: Arc<watch::Sender<LoopState>>,
    ) -> Self {
        Self {
            filter,
            dispatcher,
            processor: None,
            stop,
            state,
        }
    }

    /// Hand accepted events to a bounded fan-out processor instead of
    /// dispatching them inline.
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Run until the stop signal fires or the source closes.
    pub async fn run(mut self, mut source: WatchSource) {
        self.state.send_replace(LoopState::Watching);
        info!(pattern = ?self.filter.pattern(), "watch loop started");

        let mut errors_open = true;
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => {
                    debug!("file watch poller was stopped");
                    break;
                }
                event = source.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("file watch source closed");
                        break;
                    }
                },
                err = source.errors.recv(), if errors_open => match err {
                    Some(err) => error!(error = %err, "file watch error"),
                    None => errors_open = false,
                },
            }
        }

        source.close();
        if let Some(processor) = self.processor.take() {
            processor.stop().await;
        }

        self.state.send_replace(LoopState::Stopped);
        let counters = self.dispatcher.counters().snapshot();
        info!(
            events = counters.events,
            jobs_ok = counters.jobs_ok,
            jobs_err = counters.jobs_err,
            "watch loop stopped"
        );
    }

    async fn handle_event(&self, event: WatchEvent) {
        if !self.filter.accepts(&event) {
            debug!(op = %event.op, path = ?event.path, "event filtered out");
            return;
        }

        debug!(op = %event.op, path = ?event.path, "received a file event");

        match &self.processor {
            Some(processor) => {
                if !processor.add(event).await {
                    warn!("dispatch queue closed; dropping event");
                }
            }
            None => {
                self.dispatcher.dispatch(event).await;
            }
        }
    }
}
