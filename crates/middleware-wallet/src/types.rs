//! Wallet types — Protocol, Counterparty, and the argument/result structs
//! for signature and public key operations.

use middleware_primitives::ec::private_key::PrivateKey;
use middleware_primitives::ec::public_key::PublicKey;
use middleware_primitives::ec::signature::Signature;

/// Security level for wallet operations.
pub type SecurityLevel = i32;

/// Silent security level, no user prompts required.
pub const SECURITY_LEVEL_SILENT: SecurityLevel = 0;
/// Prompt the user once per application.
pub const SECURITY_LEVEL_EVERY_APP: SecurityLevel = 1;
/// Prompt the user per application and per counterparty combination.
pub const SECURITY_LEVEL_EVERY_APP_AND_COUNTERPARTY: SecurityLevel = 2;

/// Protocol identifier with security level and name.
#[derive(Debug, Clone)]
pub struct Protocol {
    /// The security level required by this protocol.
    pub security_level: SecurityLevel,
    /// The protocol name string.
    pub protocol: String,
}

/// The protocol under which all auth message signatures are derived.
pub fn default_auth_protocol() -> Protocol {
    Protocol {
        security_level: SECURITY_LEVEL_EVERY_APP_AND_COUNTERPARTY,
        protocol: "auth message signature".to_string(),
    }
}

/// The type of counterparty in a cryptographic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterpartyType {
    /// Not yet specified (default state).
    #[default]
    Uninitialized,
    /// The "anyone" counterparty, no specific party.
    Anyone,
    /// The wallet owner themselves.
    Self_,
    /// A specific third party identified by public key.
    Other,
}

/// Counterparty in a cryptographic operation.
#[derive(Debug, Clone, Default)]
pub struct Counterparty {
    /// The type of counterparty relationship.
    pub r#type: CounterpartyType,
    /// The counterparty's public key, required when type is `Other`.
    pub counterparty: Option<PublicKey>,
}

impl Counterparty {
    /// A counterparty referring to the wallet owner.
    pub fn self_() -> Self {
        Counterparty {
            r#type: CounterpartyType::Self_,
            counterparty: None,
        }
    }

    /// A counterparty referring to a specific peer key.
    pub fn other(key: PublicKey) -> Self {
        Counterparty {
            r#type: CounterpartyType::Other,
            counterparty: Some(key),
        }
    }
}

/// Common parameters for key derivation operations.
#[derive(Debug, Clone)]
pub struct EncryptionArgs {
    /// The protocol under which the key is derived.
    pub protocol_id: Protocol,
    /// An application-specific key identifier.
    pub key_id: String,
    /// The counterparty for the operation.
    pub counterparty: Counterparty,
}

/// Arguments for retrieving a public key.
#[derive(Debug, Clone)]
pub struct GetPublicKeyArgs {
    /// Key derivation and counterparty parameters.
    pub encryption_args: EncryptionArgs,
    /// If true, return the wallet's identity key instead of a derived key.
    pub identity_key: bool,
    /// If true, derive the key for self rather than the counterparty.
    pub for_self: Option<bool>,
}

impl GetPublicKeyArgs {
    /// Args requesting the wallet's identity key.
    pub fn identity() -> Self {
        GetPublicKeyArgs {
            encryption_args: EncryptionArgs {
                protocol_id: Protocol {
                    security_level: SECURITY_LEVEL_SILENT,
                    protocol: String::new(),
                },
                key_id: String::new(),
                counterparty: Counterparty::default(),
            },
            identity_key: true,
            for_self: None,
        }
    }
}

/// Result of a public key retrieval.
#[derive(Debug, Clone)]
pub struct GetPublicKeyResult {
    /// The retrieved or derived public key.
    pub public_key: PublicKey,
}

/// Arguments for creating a digital signature.
#[derive(Debug, Clone)]
pub struct CreateSignatureArgs {
    /// Key derivation and counterparty parameters.
    pub encryption_args: EncryptionArgs,
    /// The raw data to sign (SHA-256 hashed internally).
    pub data: Vec<u8>,
}

/// Result of a signature creation.
#[derive(Debug, Clone)]
pub struct CreateSignatureResult {
    /// The ECDSA signature.
    pub signature: Signature,
}

/// Arguments for verifying a digital signature.
#[derive(Debug, Clone)]
pub struct VerifySignatureArgs {
    /// Key derivation and counterparty parameters.
    pub encryption_args: EncryptionArgs,
    /// The original data that was signed.
    pub data: Vec<u8>,
    /// The signature to verify.
    pub signature: Option<Signature>,
    /// If true, derive the verification key for self.
    pub for_self: Option<bool>,
}

/// Result of a signature verification.
#[derive(Debug, Clone)]
pub struct VerifySignatureResult {
    /// Whether the signature is valid.
    pub valid: bool,
}

/// Returns the special "anyone" private/public key pair (scalar = 1).
pub fn anyone_key() -> (PrivateKey, PublicKey) {
    let mut bytes = [0u8; 32];
    bytes[31] = 1;
    let priv_key = PrivateKey::from_bytes(&bytes).expect("anyone key should always be valid");
    let pub_key = priv_key.pub_key();
    (priv_key, pub_key)
}
