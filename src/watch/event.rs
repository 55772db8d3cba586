// src/watch/event.rs

//! Raw filesystem events as seen by the watch loop.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::{EventKind, MetadataKind, ModifyKind, RenameMode};

/// Kind of change reported for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Write,
    Remove,
    /// Renamed within the same directory.
    Rename,
    /// Renamed into a different directory.
    Move,
    Chmod,
    Other,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Create => "CREATE",
            Op::Write => "WRITE",
            Op::Remove => "REMOVE",
            Op::Rename => "RENAME",
            Op::Move => "MOVE",
            Op::Chmod => "CHMOD",
            Op::Other => "OTHER",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change to one path, produced by the watch source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub op: Op,
    pub path: PathBuf,
    /// Previous location for `Rename` / `Move`, when the backend knows it.
    pub old_path: Option<PathBuf>,
    /// Modification time of `path` when the event was observed.
    pub mod_time: Option<DateTime<Utc>>,
}

impl WatchEvent {
    pub fn new(op: Op, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
            old_path: None,
            mod_time: None,
        }
    }

    pub fn with_mod_time(mut self, mod_time: DateTime<Utc>) -> Self {
        self.mod_time = Some(mod_time);
        self
    }

    pub fn with_old_path(mut self, old_path: impl Into<PathBuf>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }

    /// Final path component, or the whole path if there is none.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Split a `notify` event into one `WatchEvent` per affected path.
    ///
    /// Rename pairs (`RenameMode::Both`) collapse into a single event for the
    /// destination path; the op is `Move` when the parent directory changed.
    pub fn from_notify(event: notify::Event) -> Vec<WatchEvent> {
        let notify::Event { kind, paths, .. } = event;

        if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = kind {
            if let [from, to, ..] = paths.as_slice() {
                let op = if from.parent() == to.parent() {
                    Op::Rename
                } else {
                    Op::Move
                };
                return vec![WatchEvent::new(op, to.clone())
                    .with_old_path(from.clone())
                    .with_observed_mod_time()];
            }
        }

        let op = op_from_kind(&kind);
        paths
            .into_iter()
            .map(|path| WatchEvent::new(op, path).with_observed_mod_time())
            .collect()
    }

    fn with_observed_mod_time(mut self) -> Self {
        self.mod_time = observed_mod_time(&self.path);
        self
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.op, self.path)
    }
}

/// Number of pending rename cookies remembered by [`RenameTracker`].
const PENDING_RENAMES: usize = 64;

/// Stateful front end to [`WatchEvent::from_notify`] that reports each
/// rename once.
///
/// Backends that pair renames (inotify) send `Name(From)`, `Name(To)` and
/// then `Name(Both)` under one tracker id. The `To` half of a pair is
/// dropped so only the `Both` event becomes a `Rename`/`Move`. A `To` whose
/// tracker was never seen as `From` arrived from outside the watched tree
/// and is reported as a `Move`. Events without a tracker pass through.
#[derive(Debug, Default)]
pub struct RenameTracker {
    pending: VecDeque<usize>,
}

impl RenameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert(&mut self, event: notify::Event) -> Vec<WatchEvent> {
        let rename = match event.kind {
            EventKind::Modify(ModifyKind::Name(mode)) => Some(mode),
            _ => None,
        };
        match (rename, event.tracker()) {
            (Some(RenameMode::From), Some(id)) => {
                if self.pending.len() == PENDING_RENAMES {
                    self.pending.pop_front();
                }
                self.pending.push_back(id);
                WatchEvent::from_notify(event)
            }
            (Some(RenameMode::To), Some(id)) => {
                if self.pending.contains(&id) {
                    // The matching `Both` event follows.
                    return Vec::new();
                }
                event
                    .paths
                    .into_iter()
                    .map(|path| WatchEvent::new(Op::Move, path).with_observed_mod_time())
                    .collect()
            }
            (Some(RenameMode::Both), Some(id)) => {
                self.pending.retain(|pending| *pending != id);
                WatchEvent::from_notify(event)
            }
            _ => WatchEvent::from_notify(event),
        }
    }
}

/// Map a `notify` event kind onto an [`Op`].
pub fn op_from_kind(kind: &EventKind) -> Op {
    match kind {
        EventKind::Create(_) => Op::Create,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Op::Remove,
        EventKind::Modify(ModifyKind::Name(_)) => Op::Rename,
        // The polling backend reports content changes as a new mtime.
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)) => Op::Write,
        EventKind::Modify(ModifyKind::Metadata(_)) => Op::Chmod,
        EventKind::Modify(_) => Op::Write,
        EventKind::Remove(_) => Op::Remove,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::Other,
    }
}

fn observed_mod_time(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
