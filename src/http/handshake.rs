//! HTTP/1.1 → WebSocket upgrade handshake (spec §4.5 "Accept-key
//! computation", §4.6 step 4, §6 "External interfaces").

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;
use crate::http::parser::ParsedRequest;
use crate::http::types::HeaderMap;

const WS_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const DEFAULT_SUBPROTOCOL: &str = "default";

/// `Sec-WebSocket-Accept` value for a given client `Sec-WebSocket-Key`
/// (spec §4.5): base64(SHA1(key ++ magic)).
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_MAGIC.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// A validated upgrade request, ready to have its 101 response synthesized.
pub struct UpgradeRequest {
    pub target: String,
    pub accept: String,
    pub subprotocol: Option<String>,
}

/// Validates `request` as a WebSocket upgrade per spec §6, returning the
/// computed accept key. Rejects anything that isn't a clean RFC 6455
/// handshake rather than guessing at intent.
pub fn validate_upgrade(request: &ParsedRequest) -> Result<UpgradeRequest, HandshakeError> {
    let headers: &HeaderMap = &request.headers;

    if !headers.contains_token("upgrade", "websocket") {
        return Err(HandshakeError::NotWebSocketUpgrade);
    }
    if !headers.contains_token("connection", "upgrade") {
        return Err(HandshakeError::NotWebSocketUpgrade);
    }
    if headers.get_str("sec-websocket-version") != Some("13") {
        return Err(HandshakeError::UnsupportedVersion);
    }

    let key = headers
        .get_str("sec-websocket-key")
        .ok_or(HandshakeError::MissingHeader("Sec-WebSocket-Key"))?;
    let decoded = STANDARD.decode(key).map_err(|_| HandshakeError::InvalidKey)?;
    if decoded.len() != 16 {
        return Err(HandshakeError::InvalidKey);
    }

    Ok(UpgradeRequest {
        target: request.target.clone(),
        accept: accept_key(key),
        subprotocol: headers.get_str("sec-websocket-protocol").map(str::to_string),
    })
}

/// Renders the 101 Switching Protocols response (spec §4.6 step 4, §6).
pub fn render_101_response(upgrade: &UpgradeRequest) -> Vec<u8> {
    let subprotocol = upgrade.subprotocol.as_deref().unwrap_or(DEFAULT_SUBPROTOCOL);
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Protocol: {subprotocol}\r\n\
         \r\n",
        accept = upgrade.accept,
    )
    .into_bytes()
}

/// Renders the client-side GET request that opens a handshake (used by
/// [`crate::client`]).
pub fn render_client_request(host: &str, path: &str, key_b64: &str, subprotocol: Option<&str>) -> Vec<u8> {
    let mut out = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key_b64}\r\n\
         Sec-WebSocket-Version: 13\r\n",
    );
    if let Some(proto) = subprotocol {
        out.push_str(&format!("Sec-WebSocket-Protocol: {proto}\r\n"));
    }
    out.push_str("\r\n");
    out.into_bytes()
}

/// Generates a fresh 16-byte nonce, base64-encoded, for `Sec-WebSocket-Key`.
pub fn new_client_key() -> String {
    use rand::RngCore;
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    STANDARD.encode(nonce)
}
