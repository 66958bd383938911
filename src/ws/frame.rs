//! WebSocket frame codec (C5, spec §3, §4.5, §6, RFC 6455).

use rand::RngCore;

use crate::error::FrameError;

/// The four bits of a frame header that identify its purpose (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    pub fn is_data(self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary)
    }

    fn from_raw(raw: u8) -> Result<Self, FrameError> {
        match raw {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }

    fn as_raw(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }
}

/// One decoded WebSocket frame (spec §3).
#[derive(Debug, Clone)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// Whether a frame being serialized should carry a masking key. Per spec
/// §4.5, client-originated frames MUST be masked and server-originated
/// frames MUST NOT be — this is a property of the role, not a free choice,
/// so the codec takes a `Role` rather than a bare `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    fn masks(self) -> bool {
        matches!(self, Role::Client)
    }
}

const MAX_CONTROL_PAYLOAD: usize = 125;

/// Serializes one frame into `out` (spec §4.5 steps 1-4).
pub fn serialize(role: Role, fin: bool, opcode: Opcode, payload: &[u8], out: &mut Vec<u8>) {
    let masked = role.masks();
    out.push(((fin as u8) << 7) | opcode.as_raw());

    let len = payload.len();
    let mask_bit = (masked as u8) << 7;
    if len <= 125 {
        out.push(mask_bit | len as u8);
    } else if len <= 0xFFFF {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    if masked {
        let mut key = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut key);
        out.extend_from_slice(&key);
        let start = out.len();
        out.extend_from_slice(payload);
        for (i, byte) in out[start..].iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    } else {
        out.extend_from_slice(payload);
    }
}

/// Convenience: serializes a single complete message as one `fin=1` frame.
pub fn serialize_message(role: Role, opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);
    serialize(role, true, opcode, payload, &mut out);
    out
}

/// Serializes a close frame with `code` and optional `reason` text (spec
/// §4.5 "Control-frame handling").
pub fn serialize_close(role: Role, code: u16, reason: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(reason);
    serialize_message(role, Opcode::Close, &payload)
}

/// Outcome of attempting to decode one frame from a buffer (spec §4.5).
pub enum Decoded {
    /// Not enough bytes yet; try again once more data has arrived.
    Incomplete,
    /// A full frame was decoded, consuming `consumed` bytes of the input.
    Complete { frame: Frame, consumed: usize },
}

/// The role of the frame *we expect to receive* — the opposite of our own
/// role. A server expects masked client frames; a client expects unmasked
/// server frames. Violating this is a protocol error (spec §4.5).
pub fn expected_peer_masked(our_role: Role) -> bool {
    match our_role {
        Role::Server => true,
        Role::Client => false,
    }
}

/// Decodes the smallest complete frame prefix of `input`, if any (spec
/// §4.5 "Deserialize"). `max_payload` enforces an upper bound so a peer
/// can't force an unbounded allocation from a forged length field.
pub fn deserialize(input: &[u8], our_role: Role, max_payload: usize) -> Result<Decoded, FrameError> {
    if input.len() < 2 {
        return Ok(Decoded::Incomplete);
    }

    let b0 = input[0];
    let b1 = input[1];

    if b0 & 0x70 != 0 {
        return Err(FrameError::ReservedBitsSet);
    }

    let fin = b0 & 0x80 != 0;
    let opcode = Opcode::from_raw(b0 & 0x0F)?;
    let masked = b1 & 0x80 != 0;
    let len_marker = b1 & 0x7F;

    if expected_peer_masked(our_role) && !masked {
        return Err(FrameError::ClientFrameUnmasked);
    }
    if !expected_peer_masked(our_role) && masked {
        return Err(FrameError::ServerFrameMasked);
    }

    if opcode.is_control() && !fin {
        return Err(FrameError::FragmentedControlFrame);
    }

    let mut pos = 2usize;
    let payload_len: usize = match len_marker {
        126 => {
            if input.len() < pos + 2 {
                return Ok(Decoded::Incomplete);
            }
            let n = u16::from_be_bytes([input[pos], input[pos + 1]]) as usize;
            pos += 2;
            n
        }
        127 => {
            if input.len() < pos + 8 {
                return Ok(Decoded::Incomplete);
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&input[pos..pos + 8]);
            pos += 8;
            u64::from_be_bytes(buf) as usize
        }
        n => n as usize,
    };

    if opcode.is_control() && payload_len > MAX_CONTROL_PAYLOAD {
        return Err(FrameError::ControlFrameTooLong);
    }
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge(payload_len));
    }

    let mask_key = if masked {
        if input.len() < pos + 4 {
            return Ok(Decoded::Incomplete);
        }
        let mut key = [0u8; 4];
        key.copy_from_slice(&input[pos..pos + 4]);
        pos += 4;
        Some(key)
    } else {
        None
    };

    if input.len() < pos + payload_len {
        return Ok(Decoded::Incomplete);
    }

    let mut payload = input[pos..pos + payload_len].to_vec();
    if let Some(key) = mask_key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }
    pos += payload_len;

    if opcode == Opcode::Close {
        if !payload.is_empty() && payload.len() < 2 {
            return Err(FrameError::InvalidCloseLength);
        }
        if payload.len() >= 2 {
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            if !crate::ws::close::CloseCode::is_valid_on_wire(code) {
                return Err(FrameError::InvalidCloseCode(code));
            }
        }
    }

    // Text payload UTF-8 validity is checked once a full message is
    // reassembled (`ws::message::Reassembler::push`), not per-frame: a
    // fragmented message's first frame (`fin=false`) is allowed to end
    // mid-codepoint per RFC 6455.

    Ok(Decoded::Complete {
        frame: Frame { fin, opcode, payload },
        consumed: pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(payload: &[u8]) -> Frame {
        let wire = serialize_message(Role::Client, Opcode::Binary, payload);
        match deserialize(&wire, Role::Server, usize::MAX).unwrap() {
            Decoded::Complete { frame, consumed } => {
                assert_eq!(consumed, wire.len());
                frame
            }
            Decoded::Incomplete => panic!("expected a complete frame"),
        }
    }

    #[test]
    fn framing_round_trip_small() {
        let frame = roundtrip(b"hello");
        assert_eq!(frame.payload, b"hello");
        assert_eq!(frame.opcode, Opcode::Binary);
        assert!(frame.fin);
    }

    #[test]
    fn framing_round_trip_large() {
        let payload = vec![0x42u8; 70_000];
        let frame = roundtrip(&payload);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn length_encoding_boundaries() {
        for (size, header_len) in [(125, 2), (126, 4), (127, 4), (65535, 4), (65536, 10)] {
            let payload = vec![0u8; size];
            let mut out = Vec::new();
            serialize(Role::Server, true, Opcode::Binary, &payload, &mut out);
            assert_eq!(out.len() - size, header_len, "size={size}");
        }
    }

    #[test]
    fn masked_frame_masking_key_reconstructs_payload() {
        let wire = serialize_message(Role::Client, Opcode::Text, b"abc");
        let b1 = wire[1];
        assert_eq!(b1 & 0x80, 0x80, "client frames must set the mask bit");
        let key = [wire[2], wire[3], wire[4], wire[5]];
        let masked_payload = &wire[6..9];
        let unmasked: Vec<u8> = masked_payload
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % 4])
            .collect();
        assert_eq!(unmasked, b"abc");
    }

    #[test]
    fn server_frame_is_never_masked() {
        let wire = serialize_message(Role::Server, Opcode::Text, b"abc");
        assert_eq!(wire[1] & 0x80, 0);
    }

    #[test]
    fn incomplete_frame_asks_for_more_bytes() {
        let wire = serialize_message(Role::Client, Opcode::Text, b"hello world");
        match deserialize(&wire[..4], Role::Server, usize::MAX).unwrap() {
            Decoded::Incomplete => {}
            Decoded::Complete { .. } => panic!("should not be complete with truncated input"),
        }
    }

    #[test]
    fn unmasked_client_frame_is_a_protocol_error() {
        let wire = serialize_message(Role::Server, Opcode::Text, b"hi");
        assert!(matches!(
            deserialize(&wire, Role::Server, usize::MAX),
            Err(FrameError::ClientFrameUnmasked)
        ));
    }

    #[test]
    fn echo_text_hello_matches_spec_scenario() {
        let wire = serialize_message(Role::Server, Opcode::Text, b"Hello");
        assert_eq!(wire, vec![0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]);
    }

    #[test]
    fn pong_echo_matches_spec_scenario() {
        let wire = serialize_message(Role::Server, Opcode::Pong, &[0x01, 0x02, 0x03]);
        assert_eq!(wire, vec![0x8A, 0x03, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn close_frame_matches_spec_scenario() {
        let wire = serialize_close(Role::Server, 1000, b"");
        assert_eq!(wire, vec![0x88, 0x02, 0x03, 0xE8]);
    }
}
