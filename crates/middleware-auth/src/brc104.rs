//! BRC-104 HTTP binding: header names and the signed-header filter.

/// Common prefix for all BSV authentication HTTP headers.
pub const AUTH_HEADER_PREFIX: &str = "x-bsv-auth-";
/// HTTP header for the auth protocol version.
pub const HEADER_VERSION: &str = "x-bsv-auth-version";
/// HTTP header for the auth message type.
pub const HEADER_MESSAGE_TYPE: &str = "x-bsv-auth-message-type";
/// HTTP header for the sender's identity public key.
pub const HEADER_IDENTITY_KEY: &str = "x-bsv-auth-identity-key";
/// HTTP header for the sender's nonce.
pub const HEADER_NONCE: &str = "x-bsv-auth-nonce";
/// HTTP header echoing back the recipient's nonce.
pub const HEADER_YOUR_NONCE: &str = "x-bsv-auth-your-nonce";
/// HTTP header for the hex-encoded signature.
pub const HEADER_SIGNATURE: &str = "x-bsv-auth-signature";
/// HTTP header for the request identifier.
pub const HEADER_REQUEST_ID: &str = "x-bsv-auth-request-id";
/// The handshake endpoint path.
pub const AUTH_ENDPOINT: &str = "/.well-known/auth";
/// Length in bytes of a decoded request ID.
pub const REQUEST_ID_LENGTH: usize = 32;

/// Select and order the headers that are bound into signed payloads.
///
/// Both sides must agree byte-for-byte, so the rule is fixed: keep headers
/// whose lowercase name starts with `x-bsv-auth-` except the signature and
/// request-id headers (they cannot sign themselves), plus `content-type`
/// and `authorization`; sort ascending by lowercase name. The result is
/// deterministic and the transform is idempotent.
pub fn filter_and_sort_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    let mut kept: Vec<(String, String)> = headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.to_lowercase();
            let included = (name.starts_with(AUTH_HEADER_PREFIX)
                && name != HEADER_SIGNATURE
                && name != HEADER_REQUEST_ID)
                || name == "content-type"
                || name == "authorization";
            included.then_some((name, value.clone()))
        })
        .collect();
    kept.sort();
    kept
}
