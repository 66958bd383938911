//! Application-level message (C10, spec §3 "Messaging adapter", §4.10).

use std::collections::HashMap;

/// Which wire format a [`Message`] was decoded from / will be re-encoded as
/// (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    CompactBinary,
    Json,
}

/// A routing map + header map + opaque payload, the unit the messaging
/// adapter moves between the wire and an application handler (spec §3,
/// §4.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub routing: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
    pub format: Format,
}

impl Message {
    pub fn new(format: Format) -> Self {
        Message {
            routing: HashMap::new(),
            headers: HashMap::new(),
            payload: Vec::new(),
            format,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn route(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.routing.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Builds a reply that preserves this message's wire format, copying the
    /// *reply's* payload length rather than the original request's (spec §9
    /// flags the opposite as a likely-unintended bug in an older variant of
    /// the source).
    pub fn reply_with(&self, payload: impl Into<Vec<u8>>) -> Message {
        Message {
            routing: self.routing.clone(),
            headers: HashMap::new(),
            payload: payload.into(),
            format: self.format,
        }
    }
}
