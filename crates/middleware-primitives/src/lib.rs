//! Cryptographic primitives for the BSV auth middleware.
//!
//! secp256k1 keys and ECDSA signatures built on `k256`, together with the
//! SHA-256 and HMAC-SHA256 functions that BRC-42 key derivation and the
//! auth protocol's signing payloads rely on.

pub mod ec;
pub mod hash;

mod error;
pub use error::PrimitivesError;
