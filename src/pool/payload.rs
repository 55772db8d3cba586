// src/pool/payload.rs

use std::fmt;
use std::ops::BitOr;

/// Encoding of a payload body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Raw,
    Json,
}

/// Frame flags carried alongside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const EMPTY: Flags = Flags(0);
    /// Partial response; more frames follow.
    pub const STREAM: Flags = Flags(1 << 0);

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// Unit of data exchanged with a worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub body: Vec<u8>,
    pub codec: Codec,
    pub flags: Flags,
}

impl Payload {
    pub fn raw(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            codec: Codec::Raw,
            flags: Flags::EMPTY,
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_stream(&self) -> bool {
        self.flags.contains(Flags::STREAM)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} ({} bytes): {}",
            self.codec,
            self.body.len(),
            String::from_utf8_lossy(&self.body)
        )
    }
}
