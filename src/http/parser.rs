//! Incremental HTTP/1.1 request parser (C4, spec §3, §4.4).
//!
//! The source exposes this as a callback-driven parser (`message_begin`,
//! `header_field`, `header_value`, `headers_complete`, `body`,
//! `message_complete`) taking a `void*` user pointer. Spec §9 calls that out
//! directly ("Prefer a tagged-event iterator or a state-carrying parser
//! method that returns `{bytes_consumed, event}` values") and that's the
//! shape implemented here: [`Parser::parse`] consumes what it can from a
//! byte slice and returns an [`Outcome`] describing what happened, with no
//! user-data back-reference anywhere.
//!
//! Only what the WebSocket upgrade handshake needs is implemented: the
//! request line, headers (lower-cased on insert, per spec §8), and an
//! optional `Content-Length` body for the non-upgrade pass-through path
//! (spec §1, SPEC_FULL.md §B). Chunked transfer-encoding is out of scope —
//! the handshake request itself never carries a body.

use memchr::memchr;

use crate::error::HandshakeError;
use crate::http::types::HeaderMap;

const MAX_REQUEST_LINE: usize = 8 * 1024;
const MAX_HEADER_LINE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RequestLine,
    Headers,
    Body,
    Done,
}

/// One parsed HTTP/1.1 request (method, target, version, headers, body).
#[derive(Debug, Default, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub version_minor: u8,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Result of feeding bytes into the parser.
#[derive(Debug)]
pub enum Outcome {
    /// Not enough bytes yet; `consumed` bytes were absorbed into internal
    /// scratch state and the caller should append more and retry.
    Incomplete { consumed: usize },
    /// The request (request-line + headers [+ body]) is complete.
    /// `consumed` is how many bytes of the input slice belonged to this
    /// message; any remainder is the caller's (first WebSocket bytes, or a
    /// pipelined request) to handle. The parser pauses after this: another
    /// `parse` call requires [`Parser::reset`] first (spec §4.4).
    Complete { consumed: usize, request: ParsedRequest },
}

/// Incremental, pauseable HTTP/1.1 request parser (spec §4.4).
pub struct Parser {
    state: State,
    scratch: Vec<u8>,
    request: ParsedRequest,
    content_length: usize,
    max_headers: usize,
}

impl Parser {
    pub fn new(max_headers: usize) -> Self {
        Parser {
            state: State::RequestLine,
            scratch: Vec::new(),
            request: ParsedRequest::default(),
            content_length: 0,
            max_headers,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Re-initializes the parser for a new message, as required before
    /// calling [`parse`](Self::parse) again once `is_done()` is true.
    pub fn reset(&mut self) {
        self.state = State::RequestLine;
        self.scratch.clear();
        self.request = ParsedRequest::default();
        self.content_length = 0;
    }

    /// Feeds `input` into the parser. Returns bytes consumed and, once the
    /// message is complete, the parsed request (spec §4.4).
    pub fn parse(&mut self, input: &[u8]) -> Result<Outcome, HandshakeError> {
        if self.state == State::Done {
            // Caller forgot to reset(); treat as a protocol error rather
            // than silently starting a new message over stale state.
            return Err(HandshakeError::MalformedRequestLine);
        }

        let mut consumed = 0;
        loop {
            match self.state {
                State::RequestLine => {
                    match self.take_line(&input[consumed..])? {
                        Some((line, used)) => {
                            consumed += used;
                            self.parse_request_line(&line)?;
                            self.state = State::Headers;
                        }
                        None => {
                            consumed += input.len() - consumed;
                            return Ok(Outcome::Incomplete { consumed });
                        }
                    }
                }
                State::Headers => match self.take_line(&input[consumed..])? {
                    Some((line, used)) => {
                        consumed += used;
                        if line.is_empty() {
                            self.content_length = self
                                .request
                                .headers
                                .get_str("content-length")
                                .and_then(|v| v.trim().parse().ok())
                                .unwrap_or(0);
                            self.state = if self.content_length == 0 {
                                State::Done
                            } else {
                                State::Body
                            };
                            if self.state == State::Done {
                                let request = std::mem::take(&mut self.request);
                                return Ok(Outcome::Complete { consumed, request });
                            }
                        } else {
                            self.parse_header_line(&line)?;
                        }
                    }
                    None => {
                        consumed += input.len() - consumed;
                        return Ok(Outcome::Incomplete { consumed });
                    }
                },
                State::Body => {
                    let remaining = self.content_length - self.request.body.len();
                    let available = input.len() - consumed;
                    let take = remaining.min(available);
                    // Body bytes go to the body buffer (the newer upstream
                    // behavior; spec §9 flags the older URL-buffer variant
                    // as the wrong one to copy).
                    self.request.body.extend_from_slice(&input[consumed..consumed + take]);
                    consumed += take;
                    if self.request.body.len() == self.content_length {
                        self.state = State::Done;
                        let request = std::mem::take(&mut self.request);
                        return Ok(Outcome::Complete { consumed, request });
                    }
                    return Ok(Outcome::Incomplete { consumed });
                }
                State::Done => unreachable!(),
            }
        }
    }

    /// Pulls one `\r\n`-terminated line out of `self.scratch ++ input`,
    /// without copying `input` into `scratch` unless a line actually spans
    /// the boundary.
    fn take_line(&mut self, input: &[u8]) -> Result<Option<(Vec<u8>, usize)>, HandshakeError> {
        if !self.scratch.is_empty() {
            if let Some(pos) = memchr(b'\n', input) {
                self.scratch.extend_from_slice(&input[..=pos]);
                let mut line = std::mem::take(&mut self.scratch);
                trim_crlf(&mut line);
                check_line_len(&line)?;
                return Ok(Some((line, pos + 1)));
            }
            self.scratch.extend_from_slice(input);
            check_line_len(&self.scratch)?;
            return Ok(None);
        }

        match memchr(b'\n', input) {
            Some(pos) => {
                let mut line = input[..=pos].to_vec();
                trim_crlf(&mut line);
                check_line_len(&line)?;
                Ok(Some((line, pos + 1)))
            }
            None => {
                check_line_len(input)?;
                self.scratch.extend_from_slice(input);
                Ok(None)
            }
        }
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), HandshakeError> {
        let line = std::str::from_utf8(line).map_err(|_| HandshakeError::MalformedRequestLine)?;
        let mut parts = line.split(' ');
        let method = parts.next().ok_or(HandshakeError::MalformedRequestLine)?;
        let target = parts.next().ok_or(HandshakeError::MalformedRequestLine)?;
        let version = parts.next().ok_or(HandshakeError::MalformedRequestLine)?;

        let minor = match version {
            "HTTP/1.1" => 1,
            "HTTP/1.0" => 0,
            _ => return Err(HandshakeError::MalformedRequestLine),
        };

        self.request.method = method.to_string();
        self.request.target = target.to_string();
        self.request.version_minor = minor;
        Ok(())
    }

    fn parse_header_line(&mut self, line: &[u8]) -> Result<(), HandshakeError> {
        if self.request.headers.len() >= self.max_headers {
            return Err(HandshakeError::TooManyHeaders {
                limit: self.max_headers,
            });
        }
        let colon = memchr(b':', line).ok_or(HandshakeError::MalformedRequestLine)?;
        let name = &line[..colon];
        let mut value = &line[colon + 1..];
        while value.first() == Some(&b' ') {
            value = &value[1..];
        }
        self.request.headers.insert(name, value);
        Ok(())
    }
}

fn trim_crlf(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

fn check_line_len(line: &[u8]) -> Result<(), HandshakeError> {
    if line.len() > MAX_REQUEST_LINE.max(MAX_HEADER_LINE) {
        Err(HandshakeError::HeaderTooLarge)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_upgrade_request_in_one_shot() {
        let mut p = Parser::new(32);
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\n\r\n";
        match p.parse(raw).unwrap() {
            Outcome::Complete { consumed, request } => {
                assert_eq!(consumed, raw.len());
                assert_eq!(request.method, "GET");
                assert_eq!(request.headers.get("upgrade"), Some(&b"websocket"[..]));
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn incremental_feed_across_many_small_chunks() {
        let mut p = Parser::new(32);
        let raw = b"GET /chat HTTP/1.1\r\nHost: x\r\nConnection: Upgrade\r\n\r\n";
        let mut request = None;
        for chunk in raw.chunks(3) {
            match p.parse(chunk).unwrap() {
                Outcome::Incomplete { consumed } => assert_eq!(consumed, chunk.len()),
                Outcome::Complete { request: r, .. } => request = Some(r),
            }
        }
        let request = request.expect("should complete by the last chunk");
        assert_eq!(request.target, "/chat");
    }

    #[test]
    fn residual_bytes_after_headers_are_not_consumed() {
        let mut p = Parser::new(32);
        let mut raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
        raw.extend_from_slice(b"EXTRA");
        match p.parse(&raw).unwrap() {
            Outcome::Complete { consumed, .. } => assert_eq!(consumed, raw.len() - 5),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn body_bytes_go_to_body_buffer_not_url() {
        let mut p = Parser::new(32);
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        match p.parse(raw).unwrap() {
            Outcome::Complete { request, .. } => {
                assert_eq!(request.body, b"hello");
                assert_eq!(request.target, "/");
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }
}
