//! Core auth types — AuthMessage, MessageType, PeerSession,
//! RequestedCertificateSet — with the JSON wire encoding used by the
//! `/.well-known/auth` endpoint.

use std::collections::BTreeMap;

use middleware_primitives::ec::public_key::PublicKey;
use serde::{Deserialize, Serialize};

use crate::certificates::VerifiableCertificate;

/// Auth protocol version. Any other value on the wire is a fatal error.
pub const AUTH_VERSION: &str = "0.1";

/// Message types exchanged in the auth protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Initial authentication request from the initiating peer.
    #[serde(rename = "initialRequest")]
    InitialRequest,
    /// Response to an initial authentication request.
    #[serde(rename = "initialResponse")]
    InitialResponse,
    /// Request for certificates from a peer.
    #[serde(rename = "certificateRequest")]
    CertificateRequest,
    /// Response containing certificates.
    #[serde(rename = "certificateResponse")]
    CertificateResponse,
    /// A general authenticated message.
    #[serde(rename = "general")]
    General,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::InitialRequest => write!(f, "initialRequest"),
            MessageType::InitialResponse => write!(f, "initialResponse"),
            MessageType::CertificateRequest => write!(f, "certificateRequest"),
            MessageType::CertificateResponse => write!(f, "certificateResponse"),
            MessageType::General => write!(f, "general"),
        }
    }
}

/// A message exchanged during the auth protocol.
///
/// Travels as a JSON body on `/.well-known/auth` and header-encoded on
/// general requests. Nonces are base64 strings; `payload` and `signature`
/// serialize as base64 in JSON and hex in headers. Unknown JSON fields are
/// ignored on input; `None` fields are omitted on output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMessage {
    /// Version of the auth protocol.
    #[serde(default)]
    pub version: String,
    /// Type of message.
    pub message_type: MessageType,
    /// Sender's identity key (hex DER-compressed secp256k1 public key).
    #[serde(default)]
    pub identity_key: String,
    /// Sender's fresh nonce (base64).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// The initial nonce from the first handshake step (base64).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub initial_nonce: String,
    /// Echo of the recipient's nonce being responded to (base64).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub your_nonce: Option<String>,
    /// Certificates presented by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<VerifiableCertificate>>,
    /// Certificates the sender requires from the recipient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_certificates: Option<RequestedCertificateSet>,
    /// Canonical request digest input; present only on general requests.
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,
    /// DER-encoded signature covering the message.
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature: Option<Vec<u8>>,
}

impl AuthMessage {
    /// Create a new AuthMessage with the given type and sender identity key.
    pub fn new(message_type: MessageType, identity_key: String) -> Self {
        AuthMessage {
            version: AUTH_VERSION.to_string(),
            message_type,
            identity_key,
            nonce: None,
            initial_nonce: String::new(),
            your_nonce: None,
            certificates: None,
            requested_certificates: None,
            payload: None,
            signature: None,
        }
    }
}

/// A set of requested certificates: trusted certifier keys plus a map of
/// certificate type to the field names that must be revealed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedCertificateSet {
    /// Hex public keys of trusted certifiers.
    #[serde(default)]
    pub certifiers: Vec<String>,
    /// Map of certificate type to required field names.
    #[serde(default, rename = "types")]
    pub certificate_types: BTreeMap<String, Vec<String>>,
}

impl RequestedCertificateSet {
    /// Returns true if both certifiers and certificate types are empty.
    pub fn is_empty(&self) -> bool {
        self.certifiers.is_empty() && self.certificate_types.is_empty()
    }

    /// Returns true if any certificate types have been specified.
    pub fn has_certificate_types(&self) -> bool {
        !self.certificate_types.is_empty()
    }

    /// Returns true if any certifier public keys have been specified.
    pub fn has_certifiers(&self) -> bool {
        !self.certifiers.is_empty()
    }
}

/// A session with a peer, owned by the session manager.
#[derive(Debug, Clone)]
pub struct PeerSession {
    /// Whether the peer has completed authentication.
    pub is_authenticated: bool,
    /// The server-chosen session nonce, stable for the session's lifetime.
    pub session_nonce: String,
    /// The peer's initial nonce.
    pub peer_nonce: String,
    /// The peer's identity key.
    pub peer_identity_key: Option<PublicKey>,
    /// The last time the session was updated (ms since epoch).
    pub last_update: i64,
}

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Serde adapter encoding optional byte fields as base64 strings, matching
/// the JSON convention for byte slices on the wire.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_str(&BASE64.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => BASE64
                .decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
