//! Error kinds and severities.
//!
//! The original error model was a set of thread-local globals (code + text)
//! mutated by every fallible call. Here each subsystem gets its own
//! `thiserror` enum and callers get an explicit `Result`; the severity table
//! from spec §7 survives as [`Severity`] and a `severity()` accessor so the
//! reactor can decide whether an error closes the connection or is merely
//! logged and retried.

use std::io;
use thiserror::Error;

/// Coarse recovery classification for an error (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Read/write timed out; the caller may retry.
    Timeout,
    /// Non-fatal anomaly, logged and ignored.
    Warn,
    /// Peer closed or transport error; close the connection.
    Socket,
    /// OS syscall failure; surfaced to the caller.
    Sys,
    /// Protocol/runtime invariant violated; typically closes the connection.
    Rt,
    /// Allocation failure.
    Mem,
    /// Unrecoverable; the process should exit.
    Fatal,
}

/// Handshake / HTTP upgrade failures (C4, §4.4, §4.6).
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("malformed HTTP request line")]
    MalformedRequestLine,
    #[error("too many headers (limit {limit})")]
    TooManyHeaders { limit: usize },
    #[error("header line exceeds limit")]
    HeaderTooLarge,
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),
    #[error("Upgrade header is not 'websocket'")]
    NotWebSocketUpgrade,
    #[error("unsupported Sec-WebSocket-Version (want 13)")]
    UnsupportedVersion,
    #[error("Sec-WebSocket-Key is not valid base64 or wrong length")]
    InvalidKey,
    #[error("i/o error during handshake: {0}")]
    Io(#[from] io::Error),
}

impl HandshakeError {
    pub fn severity(&self) -> Severity {
        match self {
            HandshakeError::Io(_) => Severity::Socket,
            _ => Severity::Rt,
        }
    }
}

/// WebSocket framing failures (C5, §4.5).
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("reserved bits set")]
    ReservedBitsSet,
    #[error("unknown opcode 0x{0:x}")]
    UnknownOpcode(u8),
    #[error("control frame longer than 125 bytes")]
    ControlFrameTooLong,
    #[error("control frame is fragmented")]
    FragmentedControlFrame,
    #[error("client frame must be masked")]
    ClientFrameUnmasked,
    #[error("server frame must not be masked")]
    ServerFrameMasked,
    #[error("payload exceeds configured maximum ({0} bytes)")]
    PayloadTooLarge(usize),
    #[error("continuation frame with no preceding data frame")]
    UnexpectedContinuation,
    #[error("data frame received mid-fragmented-message")]
    ExpectedContinuation,
    #[error("close frame payload is neither empty nor >= 2 bytes")]
    InvalidCloseLength,
    #[error("close status code {0} is reserved or invalid")]
    InvalidCloseCode(u16),
    #[error("text payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl FrameError {
    /// Close status code to send back to the peer for this error (§4.5).
    pub fn close_code(&self) -> u16 {
        match self {
            FrameError::PayloadTooLarge(_) => 1009,
            FrameError::InvalidUtf8 => 1007,
            _ => 1002,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            FrameError::ConnectionClosed => Severity::Socket,
            _ => Severity::Rt,
        }
    }
}

/// Bounded queue lifecycle errors (C3, §4.3).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is halting or halted")]
    Halted,
}

/// Messaging-adapter failures (C10, §4.10).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,
    #[error("compact-binary decode failed: {0}")]
    MsgPack(#[from] rmp_serde::decode::Error),
    #[error("compact-binary encode failed: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    #[error("json decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top-level shape must be a 3-element array, got {0} elements")]
    WrongArity(usize),
}

impl CodecError {
    /// Messaging failures are always a policy violation (spec §7): close
    /// with status 1008.
    pub fn close_code(&self) -> u16 {
        1008
    }
}

/// Top-level error returned from public server/client operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("slot pool is full")]
    PoolFull,
    #[error("connection {0} is gone")]
    ConnectionGone(u32),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::Handshake(e) => e.severity(),
            Error::Frame(e) => e.severity(),
            Error::Queue(_) => Severity::Warn,
            Error::Codec(_) => Severity::Rt,
            Error::Io(_) => Severity::Socket,
            Error::PoolFull => Severity::Mem,
            Error::ConnectionGone(_) => Severity::Warn,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
