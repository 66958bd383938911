//! Message-level reassembly from fragmented frames (C6, spec §3, §4.6).

use crate::error::FrameError;
use crate::ws::frame::{Frame, Opcode};

/// A logical WebSocket message: the concatenated payload of one or more
/// frames beginning with a non-continuation data opcode and ending at the
/// first frame with `fin=1` (spec §3 "Message").
#[derive(Debug, Clone)]
pub struct Message {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// Accumulates data frames for one connection into complete [`Message`]s.
/// Control frames never pass through this — they're handled inline by the
/// connection state machine (spec §4.5 "Control-frame handling").
#[derive(Debug, Default)]
pub struct Reassembler {
    in_progress: Option<(Opcode, Vec<u8>)>,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler { in_progress: None }
    }

    /// Feeds one data frame (`Text`, `Binary`, or `Continuation`). Returns
    /// `Some(message)` once a frame with `fin=1` completes the sequence.
    ///
    /// Only the fully reassembled payload of a `Text` message is checked
    /// for UTF-8 validity (RFC 6455 §5.6) — an individual fragment may end
    /// mid-codepoint, so per-frame validation would reject conformant peers.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>, FrameError> {
        debug_assert!(!frame.opcode.is_control());

        match (&mut self.in_progress, frame.opcode) {
            (None, Opcode::Continuation) => Err(FrameError::UnexpectedContinuation),
            (None, op) => {
                if frame.fin {
                    return finish_message(op, frame.payload).map(Some);
                }
                self.in_progress = Some((op, frame.payload));
                Ok(None)
            }
            (Some(_), Opcode::Continuation) => {
                let (op, buf) = self.in_progress.as_mut().unwrap();
                buf.extend_from_slice(&frame.payload);
                if frame.fin {
                    let op = *op;
                    let (_, buf) = self.in_progress.take().unwrap();
                    finish_message(op, buf).map(Some)
                } else {
                    Ok(None)
                }
            }
            (Some(_), _) => Err(FrameError::ExpectedContinuation),
        }
    }
}

fn finish_message(opcode: Opcode, payload: Vec<u8>) -> Result<Message, FrameError> {
    if opcode == Opcode::Text {
        std::str::from_utf8(&payload).map_err(|_| FrameError::InvalidUtf8)?;
    }
    Ok(Message { opcode, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::frame::Opcode;

    fn frame(fin: bool, opcode: Opcode, payload: &[u8]) -> Frame {
        Frame {
            fin,
            opcode,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn single_frame_message() {
        let mut r = Reassembler::new();
        let msg = r.push(frame(true, Opcode::Text, b"hi")).unwrap().unwrap();
        assert_eq!(msg.payload, b"hi");
    }

    #[test]
    fn fragmentation_reassembles_in_order() {
        let mut r = Reassembler::new();
        assert!(r.push(frame(false, Opcode::Text, b"Hel")).unwrap().is_none());
        assert!(r
            .push(frame(false, Opcode::Continuation, b"lo, "))
            .unwrap()
            .is_none());
        let msg = r
            .push(frame(true, Opcode::Continuation, b"world"))
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, b"Hello, world");
        assert_eq!(msg.opcode, Opcode::Text);
    }

    #[test]
    fn continuation_without_start_is_an_error() {
        let mut r = Reassembler::new();
        assert!(r.push(frame(true, Opcode::Continuation, b"x")).is_err());
    }

    #[test]
    fn data_frame_mid_fragment_is_an_error() {
        let mut r = Reassembler::new();
        r.push(frame(false, Opcode::Text, b"a")).unwrap();
        assert!(r.push(frame(true, Opcode::Binary, b"b")).is_err());
    }

    #[test]
    fn fragment_ending_mid_codepoint_is_accepted_once_reassembled() {
        // "word divided into euro sign" split right in the middle of the
        // 3-byte UTF-8 encoding of U+20AC. Neither half is valid UTF-8 on
        // its own, only the reassembled payload is.
        let euro = "\u{20AC}".as_bytes().to_vec();
        let (first, second) = euro.split_at(2);
        let mut r = Reassembler::new();
        assert!(r.push(frame(false, Opcode::Text, first)).unwrap().is_none());
        let msg = r
            .push(frame(true, Opcode::Continuation, second))
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, euro);
    }

    #[test]
    fn genuinely_invalid_utf8_is_rejected_after_reassembly() {
        let mut r = Reassembler::new();
        let err = r.push(frame(true, Opcode::Text, &[0xFF, 0xFE])).unwrap_err();
        assert!(matches!(err, FrameError::InvalidUtf8));
    }
}
