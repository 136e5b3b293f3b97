//! Identity certificates presented during the certificate exchange.
//!
//! The transport validates envelope-level properties (subject, certifier,
//! requested type); semantic validation of the attested attributes belongs
//! to the application's certificate callback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A certificate field value: a string or a number.
///
/// Field payloads are schema-typed at the boundary instead of arriving as
/// untyped JSON. Byte-valued fields travel base64 inside the String arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A string value.
    String(String),
    /// A numeric value.
    Number(f64),
}

impl FieldValue {
    /// The value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    /// The value as an integer. String values are parsed, so `"18"` and
    /// `18` both yield `Some(18)`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::String(s) => s.trim().parse().ok(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 {
                    Some(*n as i64)
                } else {
                    None
                }
            }
        }
    }
}

/// A certifier-signed attestation of attributes about a subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certificate {
    /// The type of certificate (e.g. "age-verification").
    #[serde(rename = "type")]
    pub cert_type: String,
    /// The subject's identity key (hex).
    pub subject: String,
    /// The unique serial number of the certificate.
    pub serial_number: String,
    /// The certifier's identity key (hex).
    pub certifier: String,
    /// The revocation outpoint of the certificate.
    pub revocation_outpoint: String,
    /// The attested fields of the certificate.
    pub fields: BTreeMap<String, FieldValue>,
    /// The certifier's signature over the certificate.
    pub signature: String,
}

/// A certificate together with a verifier keyring and, once processed,
/// the decrypted field values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiableCertificate {
    /// The certificate data.
    #[serde(flatten)]
    pub certificate: Certificate,
    /// Field revelation keys for the verifier.
    #[serde(default)]
    pub keyring: BTreeMap<String, String>,
    /// Decrypted field values, when available.
    #[serde(
        default,
        rename = "decryptedFields",
        skip_serializing_if = "Option::is_none"
    )]
    pub decrypted_fields: Option<BTreeMap<String, String>>,
}

impl VerifiableCertificate {
    /// Wrap a certificate with its keyring.
    pub fn new(certificate: Certificate, keyring: BTreeMap<String, String>) -> Self {
        VerifiableCertificate {
            certificate,
            keyring,
            decrypted_fields: None,
        }
    }
}
