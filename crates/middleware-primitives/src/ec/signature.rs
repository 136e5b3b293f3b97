//! ECDSA signature with DER serialization.
//!
//! Signing uses RFC6979 deterministic nonces and normalizes S to the low
//! half of the curve order. Verification accepts the prehashed message
//! directly, matching how the wallet signs SHA-256 digests.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{self, VerifyingKey};

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// An ECDSA signature as its R and S components (32 bytes each, big-endian).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
}

impl Signature {
    /// Sign a prehashed message with the given private key.
    pub fn sign(hash: &[u8], private_key: &PrivateKey) -> Result<Self, PrimitivesError> {
        let sig: ecdsa::Signature = private_key.signing_key().sign_prehash(hash)?;
        let sig = sig.normalize_s().unwrap_or(sig);

        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Signature { r, s })
    }

    /// Verify this signature over a prehashed message.
    pub fn verify(&self, hash: &[u8], public_key: &PublicKey) -> bool {
        let Ok(sig) = self.to_k256() else {
            return false;
        };
        let Ok(vk) = VerifyingKey::from_sec1_bytes(&public_key.to_compressed()) else {
            return false;
        };
        vk.verify_prehash(hash, &sig).is_ok()
    }

    /// Parse a DER-encoded signature: `0x30 len 0x02 rlen R 0x02 slen S`.
    pub fn from_der(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() < 8 {
            return Err(PrimitivesError::InvalidSignature(
                "malformed signature: too short".to_string(),
            ));
        }
        if bytes[0] != 0x30 {
            return Err(PrimitivesError::InvalidSignature(
                "malformed signature: no header magic".to_string(),
            ));
        }
        let sig_len = bytes[1] as usize;
        if sig_len + 2 > bytes.len() || sig_len + 2 < 8 {
            return Err(PrimitivesError::InvalidSignature(
                "malformed signature: bad length".to_string(),
            ));
        }

        let data = &bytes[..sig_len + 2];
        let mut idx = 2;

        if data[idx] != 0x02 {
            return Err(PrimitivesError::InvalidSignature(
                "malformed signature: no 1st int marker".to_string(),
            ));
        }
        idx += 1;
        let r_len = data[idx] as usize;
        idx += 1;
        if r_len == 0 || idx + r_len > data.len().saturating_sub(3) {
            return Err(PrimitivesError::InvalidSignature(
                "malformed signature: bogus R length".to_string(),
            ));
        }
        let r_bytes = &data[idx..idx + r_len];
        idx += r_len;

        if data[idx] != 0x02 {
            return Err(PrimitivesError::InvalidSignature(
                "malformed signature: no 2nd int marker".to_string(),
            ));
        }
        idx += 1;
        let s_len = data[idx] as usize;
        idx += 1;
        if s_len == 0 || idx + s_len > data.len() {
            return Err(PrimitivesError::InvalidSignature(
                "malformed signature: bogus S length".to_string(),
            ));
        }
        let s_bytes = &data[idx..idx + s_len];

        let sig = Signature {
            r: to_32_bytes(r_bytes)?,
            s: to_32_bytes(s_bytes)?,
        };
        // Range validation happens in the k256 conversion.
        sig.to_k256()?;
        Ok(sig)
    }

    /// Serialize to DER.
    pub fn to_der(&self) -> Vec<u8> {
        let r = der_integer(&self.r);
        let s = der_integer(&self.s);

        let mut out = Vec::with_capacity(6 + r.len() + s.len());
        out.push(0x30);
        out.push((4 + r.len() + s.len()) as u8);
        out.push(0x02);
        out.push(r.len() as u8);
        out.extend_from_slice(&r);
        out.push(0x02);
        out.push(s.len() as u8);
        out.extend_from_slice(&s);
        out
    }

    fn to_k256(&self) -> Result<ecdsa::Signature, PrimitivesError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        ecdsa::Signature::from_slice(&bytes)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))
    }
}

/// Left-pad or reject a DER integer into a fixed 32-byte array.
fn to_32_bytes(bytes: &[u8]) -> Result<[u8; 32], PrimitivesError> {
    let trimmed: &[u8] = if bytes.len() > 32 {
        // A 33-byte integer is legal DER when the leading byte is the 0x00
        // sign padding; anything else is out of range.
        let (head, rest) = bytes.split_at(bytes.len() - 32);
        if head.iter().any(|&b| b != 0) {
            return Err(PrimitivesError::InvalidSignature(
                "signature component exceeds 32 bytes".to_string(),
            ));
        }
        rest
    } else {
        bytes
    };

    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}

/// Encode a 32-byte big-endian integer as a minimal DER integer body.
fn der_integer(bytes: &[u8; 32]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(31);
    let mut out = Vec::with_capacity(33);
    if bytes[start] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(&bytes[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn der_round_trip() {
        let pk = PrivateKey::new();
        let hash = sha256(b"payload to sign");
        let sig = pk.sign(&hash).unwrap();

        let der = sig.to_der();
        let parsed = Signature::from_der(&der).unwrap();
        assert_eq!(parsed, sig);
        assert!(parsed.verify(&hash, &pk.pub_key()));
    }

    #[test]
    fn rejects_malformed_der() {
        assert!(Signature::from_der(&[]).is_err());
        assert!(Signature::from_der(&[0x30, 0x02, 0x01, 0x01]).is_err());
        assert!(Signature::from_der(&[0xff; 72]).is_err());
    }

    #[test]
    fn verify_fails_for_wrong_key() {
        let signer = PrivateKey::new();
        let other = PrivateKey::new();
        let hash = sha256(b"some data");

        let sig = signer.sign(&hash).unwrap();
        assert!(sig.verify(&hash, &signer.pub_key()));
        assert!(!sig.verify(&hash, &other.pub_key()));
    }

    #[test]
    fn verify_fails_for_tampered_hash() {
        let signer = PrivateKey::new();
        let sig = signer.sign(&sha256(b"original")).unwrap();
        assert!(!sig.verify(&sha256(b"tampered"), &signer.pub_key()));
    }
}
