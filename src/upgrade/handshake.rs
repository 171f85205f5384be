//! Handshake validation, key derivation and sub-protocol negotiation.

use base64::prelude::{Engine, BASE64_STANDARD};
use hyper::header::HeaderMap;
use hyper::Method;
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Fixed magic constant appended to the client key (RFC 6455 §1.3).
pub const HANDSHAKE_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this handshake accepts.
const SUPPORTED_VERSION: &str = "13";

/// Why an upgrade request was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("not an upgrade request")]
    NotAnUpgrade,
    #[error("missing client key")]
    MissingKey,
    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),
    #[error("none of the offered sub-protocols is supported")]
    NoAgreeableProtocol,
}

/// Outcome of a validated handshake. Exists only for the duration of the
/// exchange; dropped once the upgraded transport is established.
#[derive(Debug)]
pub struct HandshakeRecord {
    pub client_key: String,
    pub offered: Vec<String>,
    pub negotiated: Option<String>,
    pub accept: String,
}

/// Derive the accept value: base64(SHA-1(client key ++ magic constant)).
pub fn accept_key(client_key: &str) -> String {
    let digest = Sha1::new()
        .chain_update(client_key.as_bytes())
        .chain_update(HANDSHAKE_GUID.as_bytes())
        .finalize();
    BASE64_STANDARD.encode(digest)
}

/// Validate an upgrade request head and negotiate a sub-protocol.
///
/// `supported` is the server's token list in preference order. The first
/// client-offered token that the server supports wins. A client that
/// offers protocols none of which are supported is rejected; a client
/// that offers none proceeds without a sub-protocol.
pub fn validate(
    method: &Method,
    headers: &HeaderMap,
    supported: &[String],
) -> Result<HandshakeRecord, HandshakeError> {
    if method != Method::GET || !is_upgrade_request(headers) {
        return Err(HandshakeError::NotAnUpgrade);
    }

    let version = headers
        .get("sec-websocket-version")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if version != SUPPORTED_VERSION {
        return Err(HandshakeError::UnsupportedVersion(version.to_string()));
    }

    let client_key = headers
        .get("sec-websocket-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(HandshakeError::MissingKey)?
        .trim()
        .to_string();
    if client_key.is_empty() {
        return Err(HandshakeError::MissingKey);
    }

    let offered = offered_protocols(headers);
    let negotiated = offered
        .iter()
        .find(|token| supported.contains(token))
        .cloned();
    if !offered.is_empty() && negotiated.is_none() {
        return Err(HandshakeError::NoAgreeableProtocol);
    }

    let accept = accept_key(&client_key);
    Ok(HandshakeRecord {
        client_key,
        offered,
        negotiated,
        accept,
    })
}

/// Header-level check: Connection carries the upgrade token and Upgrade
/// names websocket (both case-insensitive).
fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_has_upgrade = headers
        .get("connection")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        })
        .unwrap_or(false);
    let upgrade_is_websocket = headers
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    connection_has_upgrade && upgrade_is_websocket
}

/// All tokens across every Sec-WebSocket-Protocol header, comma-split,
/// in client order.
fn offered_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all("sec-websocket-protocol")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}
