// src/dispatch/processor.rs

//! Bounded fan-out for dispatches.
//!
//! Accepted events go onto a bounded queue consumed by a fixed number of
//! worker tasks. Each worker runs the normal [`Dispatcher`] path, so the
//! gate discipline and counting are the same as in sequential mode; only
//! cross-event ordering is given up.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};

use super::Dispatcher;
use crate::watch::event::WatchEvent;

/// Number of failure messages retained by [`Processor::errors`].
pub const ERROR_SINK_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct Processor {
    queue: mpsc::Sender<WatchEvent>,
    workers: Vec<JoinHandle<()>>,
    errors: Arc<Mutex<VecDeque<String>>>,
}

impl Processor {
    /// Spawn `max_workers` consumers over a queue of `queue_length` events.
    pub fn new(dispatcher: Arc<Dispatcher>, max_workers: usize, queue_length: usize) -> Self {
        let (queue, rx) = mpsc::channel::<WatchEvent>(queue_length.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let errors = Arc::new(Mutex::new(VecDeque::with_capacity(ERROR_SINK_CAPACITY)));

        let workers = (0..max_workers.max(1))
            .map(|id| {
                let rx = Arc::clone(&rx);
                let dispatcher = Arc::clone(&dispatcher);
                let errors = Arc::clone(&errors);
                tokio::spawn(
                    async move {
                        loop {
                            let event = { rx.lock().await.recv().await };
                            let Some(event) = event else {
                                break;
                            };
                            if let Some(failure) = dispatcher.dispatch(event).await.failure() {
                                push_error(&errors, failure);
                            }
                        }
                        debug!(worker = id, "dispatch worker finished");
                    }
                    .in_current_span(),
                )
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), queue_length, "dispatch processor started");

        Self {
            queue,
            workers,
            errors,
        }
    }

    /// Queue an event, waiting for room if the queue is full.
    ///
    /// Returns `false` if the processor is shutting down.
    pub async fn add(&self, event: WatchEvent) -> bool {
        self.queue.send(event).await.is_ok()
    }

    /// Most recent dispatch failures, oldest first.
    pub fn errors(&self) -> Vec<String> {
        let errors = self
            .errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        errors.iter().cloned().collect()
    }

    /// Close the queue and wait until every queued event was dispatched.
    pub async fn stop(self) {
        let Processor { queue, workers, .. } = self;
        drop(queue);
        for worker in workers {
            if let Err(err) = worker.await {
                debug!(error = %err, "dispatch worker ended abnormally");
            }
        }
        debug!("dispatch processor drained");
    }
}

fn push_error(errors: &Mutex<VecDeque<String>>, failure: String) {
    let mut errors = errors
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if errors.len() == ERROR_SINK_CAPACITY {
        errors.pop_front();
    }
    errors.push_back(failure);
}
