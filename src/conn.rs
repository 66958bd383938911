//! Per-connection state machine (C6, spec §3 "Connection", §4.6).
//!
//! ```text
//! NEW --accept--> HTTP --valid upgrade--> UPGRADED --close handshake--> CLOSING --> CLOSED
//!                     `-invalid/parse-error--------------------------------------> CLOSED
//! ```
//!
//! The reactor owns one [`Connection`] per socket and feeds it raw bytes as
//! they arrive; [`Connection::on_bytes`] returns the list of things the
//! reactor or a worker should do in response (write bytes now, hand a
//! message to a worker, or close the socket). Nothing here touches a
//! socket directly, matching the ownership rule in spec §5 that sockets are
//! reactor-thread-only.

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::error::{Error, HandshakeError};
use crate::http::handshake;
use crate::http::parser::{Outcome as HttpOutcome, Parser as HttpParser};
use crate::http::response::{DefaultHttpHandler, HttpHandler};
use crate::ws::close::CloseCode;
use crate::ws::frame::{self, Decoded, Opcode, Role};
use crate::ws::message::{Message, Reassembler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Http,
    Upgraded,
    Closing,
    Closed,
}

/// Something the caller of [`Connection::on_bytes`] must act on.
pub enum ConnEvent {
    /// Write these bytes to the socket, in order.
    Write(Vec<u8>),
    /// A complete application message ready for a worker.
    Message(Message),
    /// Close the socket once any preceding `Write` events have flushed.
    Close,
}

pub struct Connection {
    pub cid: u32,
    state: State,
    http_parser: Option<HttpParser>,
    reassembler: Reassembler,
    /// Undecoded WebSocket frame bytes carried across `on_bytes` calls
    /// (spec §2 "Data flow": "appends to per-connection inbound buffer").
    /// A single `read()` chunk can split a frame anywhere, so whatever
    /// `frame::deserialize` can't use yet has to survive to the next call
    /// instead of being dropped with the chunk that held it.
    inbound: Buffer,
    max_payload: usize,
    close_sent: bool,
    http_handler: Arc<dyn HttpHandler>,
}

impl Connection {
    pub fn new(cid: u32, max_headers: usize, max_payload: usize) -> Self {
        Connection::with_http_handler(cid, max_headers, max_payload, Arc::new(DefaultHttpHandler))
    }

    /// Like [`new`](Self::new) but routes requests that never ask to
    /// upgrade to `http_handler` instead of the built-in 404 (spec §1
    /// "pass-through hook for non-upgrade requests").
    pub fn with_http_handler(
        cid: u32,
        max_headers: usize,
        max_payload: usize,
        http_handler: Arc<dyn HttpHandler>,
    ) -> Self {
        Connection {
            cid,
            state: State::Http,
            http_parser: Some(HttpParser::new(max_headers)),
            reassembler: Reassembler::new(),
            inbound: Buffer::new(),
            max_payload,
            close_sent: false,
            http_handler,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Processes newly-arrived bytes, draining as many complete HTTP
    /// messages / WebSocket frames as `input` contains. Returns the ordered
    /// list of events the reactor must act on.
    pub fn on_bytes(&mut self, input: &[u8]) -> Result<Vec<ConnEvent>, Error> {
        let mut events = Vec::new();
        let mut cursor = input;

        loop {
            match self.state {
                State::Http => {
                    let parser = self.http_parser.as_mut().expect("parser present in Http state");
                    let outcome = parser.parse(cursor);
                    match outcome {
                        Ok(HttpOutcome::Incomplete { consumed }) => {
                            cursor = &cursor[consumed..];
                            break;
                        }
                        Ok(HttpOutcome::Complete { consumed, request }) => {
                            cursor = &cursor[consumed..];
                            match handshake::validate_upgrade(&request) {
                                Ok(upgrade) => {
                                    events.push(ConnEvent::Write(handshake::render_101_response(&upgrade)));
                                    self.http_parser = None;
                                    self.state = State::Upgraded;
                                    // Bytes pipelined in the same read as the handshake
                                    // request belong to the framing path now; hand them
                                    // to the inbound buffer instead of leaving them on
                                    // `cursor`, which the Http arm would otherwise own.
                                    if !cursor.is_empty() {
                                        self.inbound.append(cursor);
                                        cursor = &[];
                                    }
                                }
                                Err(HandshakeError::NotWebSocketUpgrade) => {
                                    // A plain HTTP request on the same listener, not a
                                    // broken upgrade attempt — hand it to the
                                    // pass-through handler and close after responding.
                                    let response = self.http_handler.handle(&request);
                                    events.push(ConnEvent::Write(response.render()));
                                    events.push(ConnEvent::Close);
                                    self.state = State::Closed;
                                }
                                Err(e) => {
                                    self.state = State::Closed;
                                    return Err(e.into());
                                }
                            }
                        }
                        Err(e) => {
                            self.state = State::Closed;
                            return Err(e.into());
                        }
                    }
                }
                State::Upgraded => {
                    if !cursor.is_empty() {
                        self.inbound.append(cursor);
                        cursor = &[];
                    }
                    if self.inbound.is_empty() {
                        break;
                    }
                    match frame::deserialize(self.inbound.as_slice(), Role::Server, self.max_payload) {
                        // Not enough bytes yet: leave them in `self.inbound` for the
                        // next `on_bytes` call instead of dropping them with `cursor`.
                        Ok(Decoded::Incomplete) => break,
                        Ok(Decoded::Complete { frame, consumed }) => {
                            self.inbound.drain(consumed);
                            self.handle_frame(frame, &mut events)?;
                        }
                        Err(e) => {
                            self.inbound.clear();
                            let code = e.close_code();
                            events.push(ConnEvent::Write(frame::serialize_close(Role::Server, code, b"")));
                            events.push(ConnEvent::Close);
                            self.state = State::Closed;
                            return Err(e.into());
                        }
                    }
                }
                State::Closing | State::Closed => break,
            }
        }

        Ok(events)
    }

    fn handle_frame(&mut self, frame: crate::ws::frame::Frame, events: &mut Vec<ConnEvent>) -> Result<(), Error> {
        match frame.opcode {
            Opcode::Close => {
                if !self.close_sent {
                    events.push(ConnEvent::Write(frame::serialize_close(
                        Role::Server,
                        CloseCode::Normal.as_u16(),
                        b"",
                    )));
                    self.close_sent = true;
                }
                events.push(ConnEvent::Close);
                self.state = State::Closing;
                Ok(())
            }
            Opcode::Ping => {
                if !self.close_sent {
                    events.push(ConnEvent::Write(frame::serialize_message(
                        Role::Server,
                        Opcode::Pong,
                        &frame.payload,
                    )));
                }
                Ok(())
            }
            Opcode::Pong => Ok(()),
            Opcode::Text | Opcode::Binary | Opcode::Continuation => {
                match self.reassembler.push(frame) {
                    Ok(Some(message)) => {
                        events.push(ConnEvent::Message(message));
                        Ok(())
                    }
                    Ok(None) => Ok(()),
                    Err(e) => {
                        if !self.close_sent {
                            events.push(ConnEvent::Write(frame::serialize_close(
                                Role::Server,
                                e.close_code(),
                                b"",
                            )));
                            self.close_sent = true;
                        }
                        events.push(ConnEvent::Close);
                        self.state = State::Closed;
                        Err(Error::Frame(e))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_http_request_is_routed_to_pass_through_handler() {
        let mut conn = Connection::new(0, 32, 1 << 20);
        let events = conn.on_bytes(b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ConnEvent::Write(bytes) => assert!(String::from_utf8_lossy(bytes).starts_with("HTTP/1.1 404")),
            _ => panic!("expected an HTTP response write"),
        }
        assert!(matches!(events[1], ConnEvent::Close));
        assert_eq!(conn.state(), State::Closed);
    }

    fn handshake_bytes() -> Vec<u8> {
        b"GET / HTTP/1.1\r\n\
          Host: x\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
          Sec-WebSocket-Version: 13\r\n\r\n"
            .to_vec()
    }

    #[test]
    fn upgrade_then_text_echo_scenario() {
        let mut conn = Connection::new(0, 32, 1 << 20);
        let events = conn.on_bytes(&handshake_bytes()).unwrap();
        assert!(matches!(events[0], ConnEvent::Write(_)));
        assert_eq!(conn.state(), State::Upgraded);

        let client_frame = frame::serialize_message(Role::Client, Opcode::Text, b"Hello");
        let events = conn.on_bytes(&client_frame).unwrap();
        assert!(matches!(&events[0], ConnEvent::Message(m) if m.payload == b"Hello"));
    }

    #[test]
    fn residual_bytes_after_handshake_are_processed_as_frames() {
        let mut conn = Connection::new(0, 32, 1 << 20);
        let mut combined = handshake_bytes();
        combined.extend(frame::serialize_message(Role::Client, Opcode::Ping, &[1, 2, 3]));

        let events = conn.on_bytes(&combined).unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            ConnEvent::Write(bytes) => assert_eq!(bytes, &vec![0x8A, 0x03, 0x01, 0x02, 0x03]),
            _ => panic!("expected a pong write"),
        }
    }

    #[test]
    fn close_handshake_emits_reply_then_close() {
        let mut conn = Connection::new(0, 32, 1 << 20);
        conn.on_bytes(&handshake_bytes()).unwrap();

        let close_frame = frame::serialize_close(Role::Client, 1000, b"");
        let events = conn.on_bytes(&close_frame).unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ConnEvent::Write(bytes) => assert_eq!(bytes, &vec![0x88, 0x02, 0x03, 0xE8]),
            _ => panic!("expected close reply"),
        }
        assert!(matches!(events[1], ConnEvent::Close));
        assert_eq!(conn.state(), State::Closing);
    }

    #[test]
    fn fragmented_message_scenario() {
        let mut conn = Connection::new(0, 32, 1 << 20);
        conn.on_bytes(&handshake_bytes()).unwrap();

        let mut wire = Vec::new();
        frame::serialize(Role::Client, false, Opcode::Text, b"Hel", &mut wire);
        frame::serialize(Role::Client, false, Opcode::Continuation, b"lo, ", &mut wire);
        frame::serialize(Role::Client, true, Opcode::Continuation, b"world", &mut wire);

        let events = conn.on_bytes(&wire).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ConnEvent::Message(m) => assert_eq!(m.payload, b"Hello, world"),
            _ => panic!("expected one reassembled message"),
        }
    }

    #[test]
    fn frame_split_across_two_on_bytes_calls_is_not_dropped() {
        let mut conn = Connection::new(0, 32, 1 << 20);
        conn.on_bytes(&handshake_bytes()).unwrap();

        let wire = frame::serialize_message(Role::Client, Opcode::Text, b"Hello, world");
        let (first, second) = wire.split_at(3);

        let events = conn.on_bytes(first).unwrap();
        assert!(events.is_empty(), "no complete frame yet, nothing should fire");

        let events = conn.on_bytes(second).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ConnEvent::Message(m) => assert_eq!(m.payload, b"Hello, world"),
            _ => panic!("expected the reassembled message once the tail arrives"),
        }
    }
}
