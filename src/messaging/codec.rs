//! Compact-binary / JSON auto-detecting codec for the messaging adapter
//! (C10, spec §4.10, §6 "Compact-binary message framing" / "JSON message
//! framing").
//!
//! `0x93` is not an arbitrary magic byte the spec invented: it's
//! MessagePack's own header for "array, 3 elements" (`0x9N` = fixarray of
//! `N`). So the compact-binary format described in spec.md *is* MessagePack,
//! and the auto-detect rule ("first byte `0x93`") falls out of decoding the
//! envelope as a 3-tuple with `rmp-serde` — no bespoke binary format to
//! hand-roll.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::messaging::message::{Format, Message};

const COMPACT_BINARY_MARKER: u8 = 0x93;

#[derive(Serialize, Deserialize)]
struct CompactWire(
    HashMap<String, String>,
    HashMap<String, String>,
    #[serde(with = "serde_bytes")] Vec<u8>,
);

/// Decodes `bytes` as a [`Message`], choosing compact-binary or JSON based
/// on the first byte (spec §4.10, §8 "Auto-detect exclusivity").
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    match bytes.first() {
        None => Err(CodecError::Empty),
        Some(&COMPACT_BINARY_MARKER) => decode_compact_binary(bytes),
        Some(_) => decode_json(bytes),
    }
}

fn decode_compact_binary(bytes: &[u8]) -> Result<Message, CodecError> {
    let CompactWire(routing, headers, payload) = rmp_serde::from_slice(bytes)?;
    Ok(Message {
        routing,
        headers,
        payload,
        format: Format::CompactBinary,
    })
}

fn decode_json(bytes: &[u8]) -> Result<Message, CodecError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let arr = value.as_array().ok_or(CodecError::WrongArity(0))?;
    if arr.len() != 3 {
        return Err(CodecError::WrongArity(arr.len()));
    }
    let routing: HashMap<String, String> = serde_json::from_value(arr[0].clone())?;
    let headers: HashMap<String, String> = serde_json::from_value(arr[1].clone())?;
    let payload_str: String = serde_json::from_value(arr[2].clone())?;
    Ok(Message {
        routing,
        headers,
        payload: payload_str.into_bytes(),
        format: Format::Json,
    })
}

/// Encodes `message` using its recorded format (spec §4.10 "Serialization
/// on send uses the message's recorded format").
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    match message.format {
        Format::CompactBinary => encode_compact_binary(message),
        Format::Json => Ok(encode_json(message)),
    }
}

fn encode_compact_binary(message: &Message) -> Result<Vec<u8>, CodecError> {
    let wire = CompactWire(
        message.routing.clone(),
        message.headers.clone(),
        message.payload.clone(),
    );
    Ok(rmp_serde::to_vec(&wire)?)
}

fn encode_json(message: &Message) -> Vec<u8> {
    let payload_str = String::from_utf8_lossy(&message.payload).into_owned();
    let value = serde_json::json!([message.routing, message.headers, payload_str]);
    serde_json::to_vec(&value).expect("json array of plain maps/strings never fails to encode")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_binary_round_trip_and_marker() {
        let msg = Message::new(Format::CompactBinary)
            .route("topic", "orders")
            .header("trace-id", "abc")
            .with_payload(b"payload-bytes".to_vec());
        let wire = encode(&msg).unwrap();
        assert_eq!(wire[0], COMPACT_BINARY_MARKER);

        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded.format, Format::CompactBinary);
        assert_eq!(decoded.routing.get("topic"), Some(&"orders".to_string()));
        assert_eq!(decoded.payload, b"payload-bytes");
    }

    #[test]
    fn json_round_trip() {
        let msg = Message::new(Format::Json).route("topic", "orders").with_payload(b"hi".to_vec());
        let wire = encode(&msg).unwrap();
        assert_ne!(wire[0], COMPACT_BINARY_MARKER);

        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded.format, Format::Json);
        assert_eq!(decoded.payload, b"hi");
    }

    #[test]
    fn auto_detect_exclusivity() {
        let binary = encode(&Message::new(Format::CompactBinary)).unwrap();
        assert_eq!(decode(&binary).unwrap().format, Format::CompactBinary);

        let json = encode(&Message::new(Format::Json)).unwrap();
        assert_eq!(decode(&json).unwrap().format, Format::Json);
    }

    #[test]
    fn json_wrong_arity_is_an_error() {
        let wire = serde_json::to_vec(&serde_json::json!([{}, {}])).unwrap();
        assert!(matches!(decode(&wire), Err(CodecError::WrongArity(2))));
    }

    #[test]
    fn reply_uses_reply_payload_length_not_request_length() {
        let request = Message::new(Format::Json).with_payload(b"a longer request body".to_vec());
        let reply = request.reply_with(b"ok".to_vec());
        assert_eq!(reply.payload.len(), 2);
    }
}
