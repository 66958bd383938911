//! Close status codes (spec §4.5 "Close codes").

/// RFC 6455 close status codes this stack generates or recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    Normal = 1000,
    GoingAway = 1001,
    ProtocolError = 1002,
    Unsupported = 1003,
    InvalidPayload = 1007,
    Policy = 1008,
    TooBig = 1009,
    InternalError = 1011,
    Restart = 1012,
    TryAgainLater = 1013,
}

impl CloseCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Codes 0-999, 1004-1006, 1015, and >= 5000 are reserved/invalid for a
    /// peer to send on the wire (spec §4.5, §8).
    pub fn is_valid_on_wire(code: u16) -> bool {
        matches!(code, 1000..=1003 | 1007..=1011 | 3000..=4999)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        code.as_u16()
    }
}
