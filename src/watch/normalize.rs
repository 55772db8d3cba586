// src/watch/normalize.rs

//! Turns accepted watch events into worker payloads.

use serde::Serialize;

use crate::pool::{Codec, Payload};
use crate::types::PayloadMode;
use crate::watch::event::WatchEvent;

/// Fixed-shape description of one event, sent to workers as JSON.
///
/// Fields are declared in key order so the encoding is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetails {
    pub directory: String,
    #[serde(rename = "eventTime")]
    pub event_time: String,
    pub file: String,
    pub op: String,
    pub path: String,
}

impl EventDetails {
    pub fn from_event(directory: &str, event: &WatchEvent) -> Self {
        Self {
            directory: directory.to_string(),
            event_time: event
                .mod_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            file: event.name(),
            op: event.op.to_string(),
            path: event.path.to_string_lossy().into_owned(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    directory: String,
    mode: PayloadMode,
}

impl Normalizer {
    /// `directory` is reported verbatim in every `EventDetails`.
    pub fn new(directory: impl Into<String>, mode: PayloadMode) -> Self {
        Self {
            directory: directory.into(),
            mode,
        }
    }

    pub fn mode(&self) -> PayloadMode {
        self.mode
    }

    pub fn normalize(&self, event: &WatchEvent) -> Result<Payload, serde_json::Error> {
        match self.mode {
            PayloadMode::Rich => {
                let body = EventDetails::from_event(&self.directory, event).to_json()?;
                Ok(Payload {
                    body,
                    codec: Codec::Json,
                    ..Payload::default()
                })
            }
            PayloadMode::Minimal => Ok(Payload::raw(
                event.path.to_string_lossy().into_owned().into_bytes(),
            )),
        }
    }
}
