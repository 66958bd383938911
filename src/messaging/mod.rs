//! Thin messaging layer on top of the WebSocket core (C10, spec §1, §4.10).

pub mod codec;
pub mod message;

pub use message::{Format, Message};

use crate::error::CodecError;
use crate::ws::frame::Opcode;
use crate::ws::message::Message as WsMessage;

/// Translates one inbound WebSocket message into a [`Message`] (spec §4.10
/// "Adapter handlers translate a parsed WebSocket message into a
/// `Message`"). Any deserialization failure is a policy violation per spec
/// §7 and is surfaced as [`CodecError`] so the caller can close with 1008.
pub fn from_ws(ws_message: &WsMessage) -> Result<Message, CodecError> {
    codec::decode(&ws_message.payload)
}

/// Serializes `message` and wraps it as a single binary WebSocket frame
/// payload, ready for [`crate::worker::Reply::send`] with [`Opcode::Binary`].
pub fn to_ws_payload(message: &Message) -> Result<Vec<u8>, CodecError> {
    codec::encode(message)
}

pub const BINARY_FRAME_OPCODE: Opcode = Opcode::Binary;
