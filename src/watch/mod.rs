// src/watch/mod.rs

//! File watching and event handling.
//!
//! This module is responsible for:
//! - Wiring up a filesystem watcher (`notify`) and translating its events.
//! - Deciding which events are worth a job (operation allow-list + regex).
//! - Building the payload for an accepted event.
//! - Running the loop that feeds accepted events into the dispatcher.
//!
//! It does **not** know how jobs are executed; that lives in `dispatch` and
//! `pool`.

pub mod event;
pub mod filter;
pub mod listener;
pub mod normalize;
pub mod source;

pub use event::{op_from_kind, Op, RenameTracker, WatchEvent};
pub use filter::{EventFilter, ACCEPTED_OPS};
pub use listener::{Listener, LoopState};
pub use normalize::{EventDetails, Normalizer};
pub use source::{SourceOptions, SourceSender, WatchSource};
