/// Error types for authentication operations, each mapped to the HTTP
/// status the middleware surfaces it with.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is malformed: bad JSON, missing or invalid headers,
    /// wrong protocol version.
    #[error("{0}")]
    BadRequest(String),

    /// Authentication failed: unknown or replayed nonce, missing session,
    /// failed signature verification.
    #[error("{0}")]
    Unauthorized(String),

    /// The auth protocol version is not supported.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// The requested session was not found.
    #[error("session not found")]
    SessionNotFound,

    /// The session exists but has not been authenticated.
    #[error("session not authenticated")]
    NotAuthenticated,

    /// Receipt of a message type only a client should handle.
    #[error("not implemented")]
    NotImplemented,

    /// An error from the wallet layer.
    #[error("wallet error: {0}")]
    Wallet(#[from] middleware_wallet::WalletError),

    /// JSON serialization or deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// An internal failure: signing, response capture, lock state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// The HTTP status this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::BadRequest(_)
            | AuthError::UnsupportedVersion(_)
            | AuthError::Json(_)
            | AuthError::Base64(_) => 400,
            AuthError::Unauthorized(_)
            | AuthError::SessionNotFound
            | AuthError::NotAuthenticated => 401,
            AuthError::NotImplemented | AuthError::Wallet(_) | AuthError::Internal(_) => 500,
        }
    }
}
