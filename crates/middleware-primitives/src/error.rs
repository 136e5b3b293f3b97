/// Error types for primitive operations.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    /// The private key bytes do not form a valid secp256k1 scalar.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The public key bytes do not form a valid secp256k1 point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The signature encoding is malformed or its components are out of range.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// An error from the underlying ECDSA implementation.
    #[error("ecdsa error: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),
}
