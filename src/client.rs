//! Blocking client-side socket contract and a minimal WebSocket client
//! (spec §1 "external collaborator", SPEC_FULL.md §B).
//!
//! spec.md treats the client transport as out of scope beyond a
//! `{connect, read, write, close, set_timeout}` contract the core consumes.
//! [`BlockingSocket`] is that contract, expressed as a trait so a TLS
//! implementation could be swapped in without touching [`WsClient`]; the
//! one real implementation here is a plain `std::net::TcpStream`, used by
//! the integration tests and the `demos/` examples.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Error, FrameError, HandshakeError};
use crate::http::handshake;
use crate::ws::frame::{self, Decoded, Opcode, Role};
use crate::ws::message::{Message, Reassembler};

/// Minimal blocking socket contract the WebSocket client core consumes
/// (spec §1).
pub trait BlockingSocket: Read + Write {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

impl BlockingSocket for TcpStream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        self.shutdown(std::net::Shutdown::Both)
    }
}

/// A blocking WebSocket client connection (spec §1, §6).
pub struct WsClient<S: BlockingSocket> {
    socket: S,
    inbound: Vec<u8>,
    reassembler: Reassembler,
    max_payload: usize,
}

impl WsClient<TcpStream> {
    /// Connects over plain TCP and performs the RFC 6455 handshake (spec
    /// §6 "HTTP upgrade (request)").
    pub fn connect<A: ToSocketAddrs>(addr: A, host: &str, path: &str) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr).map_err(HandshakeError::Io)?;
        Self::handshake(stream, host, path)
    }
}

impl<S: BlockingSocket> WsClient<S> {
    /// Runs the handshake over an already-connected socket.
    pub fn handshake(mut socket: S, host: &str, path: &str) -> Result<Self, Error> {
        let key = handshake::new_client_key();
        let request = handshake::render_client_request(host, path, &key, None);
        socket.write_all(&request).map_err(HandshakeError::Io)?;

        let expected_accept = handshake::accept_key(&key);
        let mut buf = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = socket.read(&mut chunk).map_err(HandshakeError::Io)?;
            if n == 0 {
                return Err(HandshakeError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "closed during handshake")).into());
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = find_header_end(&buf) {
                let header_text = String::from_utf8_lossy(&buf[..end]);
                if !header_text.contains("101") {
                    return Err(HandshakeError::NotWebSocketUpgrade.into());
                }
                let accept_line = header_text
                    .lines()
                    .find(|l| l.to_ascii_lowercase().starts_with("sec-websocket-accept:"))
                    .ok_or(HandshakeError::MissingHeader("Sec-WebSocket-Accept"))?;
                let got = accept_line.split(':').nth(1).unwrap_or("").trim();
                if got != expected_accept {
                    return Err(HandshakeError::InvalidKey.into());
                }

                let residual = buf[end..].to_vec();
                return Ok(WsClient {
                    socket,
                    inbound: residual,
                    reassembler: Reassembler::new(),
                    max_payload: 64 * 1024 * 1024,
                });
            }
        }
    }

    /// Sends one complete message as a single masked frame (spec §4.5
    /// "Client-originated frames MUST be masked").
    pub fn send(&mut self, opcode: Opcode, payload: &[u8]) -> Result<(), Error> {
        let wire = frame::serialize_message(Role::Client, opcode, payload);
        self.socket.write_all(&wire).map_err(HandshakeError::Io)?;
        Ok(())
    }

    pub fn send_close(&mut self, code: u16) -> Result<(), Error> {
        let wire = frame::serialize_close(Role::Client, code, b"");
        self.socket.write_all(&wire).map_err(HandshakeError::Io)?;
        Ok(())
    }

    /// Blocks until one complete application [`Message`] has been
    /// reassembled, transparently replying to pings and ignoring pongs.
    pub fn receive_message(&mut self) -> Result<Message, Error> {
        let mut chunk = [0u8; 4096];
        loop {
            match frame::deserialize(&self.inbound, Role::Client, self.max_payload) {
                Ok(Decoded::Complete { frame, consumed }) => {
                    self.inbound.drain(0..consumed);
                    match frame.opcode {
                        Opcode::Ping => self.send(Opcode::Pong, &frame.payload)?,
                        Opcode::Pong => {}
                        Opcode::Close => return Err(FrameError::ConnectionClosed.into()),
                        _ => {
                            if let Some(message) = self.reassembler.push(frame).map_err(Error::Frame)? {
                                return Ok(message);
                            }
                        }
                    }
                }
                Ok(Decoded::Incomplete) => {
                    let n = self.socket.read(&mut chunk).map_err(HandshakeError::Io)?;
                    if n == 0 {
                        return Err(HandshakeError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "closed")).into());
                    }
                    self.inbound.extend_from_slice(&chunk[..n]);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.socket.close()
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}
