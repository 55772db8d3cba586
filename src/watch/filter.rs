// src/watch/filter.rs

use regex::Regex;

use crate::types::MatchTarget;
use crate::watch::event::{Op, WatchEvent};

/// Operations forwarded to the worker pool. Everything else (remove, chmod,
/// access) is dropped regardless of the pattern.
pub const ACCEPTED_OPS: [Op; 4] = [Op::Rename, Op::Move, Op::Create, Op::Write];

/// Compiled accept/reject predicate for raw watch events.
///
/// Built once at startup; an invalid pattern fails there and never at
/// dispatch time.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pattern: Option<Regex>,
    target: MatchTarget,
}

impl EventFilter {
    /// Compile `pattern`. An empty pattern matches every path.
    pub fn new(pattern: &str, target: MatchTarget) -> Result<Self, regex::Error> {
        let pattern = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern)?)
        };
        Ok(Self { pattern, target })
    }

    /// Filter that only applies the operation allow-list.
    pub fn accept_all() -> Self {
        Self {
            pattern: None,
            target: MatchTarget::Path,
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn accepts_op(op: Op) -> bool {
        ACCEPTED_OPS.contains(&op)
    }

    /// Pattern check only.
    pub fn matches(&self, event: &WatchEvent) -> bool {
        let Some(re) = &self.pattern else {
            return true;
        };
        match self.target {
            MatchTarget::Path => re.is_match(&event.path.to_string_lossy()),
            MatchTarget::Name => re.is_match(&event.name()),
        }
    }

    pub fn accepts(&self, event: &WatchEvent) -> bool {
        Self::accepts_op(event.op) && self.matches(event)
    }
}
