//! secp256k1 public key.
//!
//! SEC1 parsing and serialization, ECDSA verification, and the public-key
//! side of BRC-42 child derivation.

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, ProjectivePoint, Scalar};
use std::fmt;

use crate::ec::private_key::PrivateKey;
use crate::ec::signature::Signature;
use crate::hash::sha256_hmac;
use crate::PrimitivesError;

/// Length of a compressed public key (prefix + 32-byte x-coordinate).
const COMPRESSED_LEN: usize = 33;

/// A secp256k1 public key used for verification and key derivation.
#[derive(Clone, Debug)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Parse a public key from SEC1 bytes (compressed or uncompressed).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.is_empty() {
            return Err(PrimitivesError::InvalidPublicKey(
                "public key bytes are empty".to_string(),
            ));
        }
        let vk = VerifyingKey::from_sec1_bytes(bytes)?;
        Ok(PublicKey { inner: vk })
    }

    /// Parse a public key from a hex-encoded SEC1 string.
    ///
    /// This is the wire format for identity keys (66 hex chars, compressed).
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize in compressed SEC1 form (33 bytes).
    pub fn to_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Serialize as a lowercase hex string of the compressed encoding.
    ///
    /// For secp256k1 the DER encoding of a public key is its compressed
    /// SEC1 form, so this doubles as the DER-hex identity key string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Verify an ECDSA signature against a message hash.
    pub fn verify(&self, hash: &[u8], sig: &Signature) -> bool {
        sig.verify(hash, self)
    }

    /// Derive a BRC-42 child public key.
    ///
    /// Computes the ECDH shared secret between this key and `private_key`,
    /// HMAC-SHA256s the invoice number under the compressed secret, and
    /// adds `hmac * G` to this point. Matches the private-key side:
    /// `root.derive_child(cp_pub, n).pub_key() == root_pub.derive_child(cp, n)`.
    pub fn derive_child(
        &self,
        private_key: &PrivateKey,
        invoice_number: &str,
    ) -> Result<PublicKey, PrimitivesError> {
        let shared_secret = private_key.derive_shared_secret(self)?;
        let hmac_result = sha256_hmac(&shared_secret.to_compressed(), invoice_number.as_bytes());

        use k256::elliptic_curve::ops::Reduce;
        let uint = k256::U256::from_be_slice(&hmac_result);
        let hmac_scalar = <Scalar as Reduce<k256::U256>>::reduce(uint);
        let tweak_point = ProjectivePoint::GENERATOR * hmac_scalar;

        let result_point = self.to_projective_point()? + tweak_point;

        let affine = result_point.to_affine();
        let encoded = affine.to_encoded_point(true);
        PublicKey::from_bytes(encoded.as_bytes())
    }

    /// Convert to a k256 projective point for curve arithmetic.
    pub(crate) fn to_projective_point(&self) -> Result<ProjectivePoint, PrimitivesError> {
        let encoded = self.inner.to_encoded_point(false);
        let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        match affine {
            Some(point) => Ok(ProjectivePoint::from(point)),
            None => Err(PrimitivesError::InvalidPublicKey(
                "point is not on the curve".to_string(),
            )),
        }
    }

    /// Wrap a k256 verifying key.
    pub(crate) fn from_k256_verifying_key(vk: &VerifyingKey) -> Self {
        PublicKey { inner: *vk }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_compressed() == other.to_compressed()
    }
}

impl Eq for PublicKey {}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let pk = PrivateKey::new();
        let pub_key = pk.pub_key();

        let parsed = PublicKey::from_hex(&pub_key.to_hex()).unwrap();
        assert_eq!(parsed, pub_key);
        assert_eq!(pub_key.to_hex().len(), 66);
    }

    #[test]
    fn accepts_uncompressed_encoding() {
        let pk = PrivateKey::new();
        let pub_key = pk.pub_key();

        let uncompressed = pub_key.inner.to_encoded_point(false);
        let parsed = PublicKey::from_bytes(uncompressed.as_bytes()).unwrap();
        assert_eq!(parsed, pub_key);
    }

    #[test]
    fn rejects_garbage() {
        assert!(PublicKey::from_bytes(&[]).is_err());
        assert!(PublicKey::from_bytes(&[0x02; 33]).is_err());
        assert!(PublicKey::from_hex("not hex").is_err());
    }
}
