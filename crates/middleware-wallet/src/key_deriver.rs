//! BRC-42/43 key derivation.
//!
//! Derives private and public child keys from a root private key using the
//! invoice number scheme. The derivation is counterparty-symmetric:
//! `root.derive_child(cp_pub, n).pub_key() == cp_pub.derive_child(root, n)`,
//! which lets two peers arrive at the same key pair without sharing secrets.

use regex::Regex;
use std::sync::LazyLock;

use middleware_primitives::ec::private_key::PrivateKey;
use middleware_primitives::ec::public_key::PublicKey;

use crate::error::WalletError;
use crate::types::{anyone_key, Counterparty, CounterpartyType, Protocol};

static RE_ONLY_LETTERS_NUMBERS_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9 ]+$").unwrap());

/// Derives child keys from a root private key using BRC-42/43.
#[derive(Clone, Debug)]
pub struct KeyDeriver {
    root_key: PrivateKey,
}

impl KeyDeriver {
    /// Create a new KeyDeriver. If `private_key` is None, uses the "anyone"
    /// key (scalar = 1).
    pub fn new(private_key: Option<PrivateKey>) -> Self {
        let root_key = private_key.unwrap_or_else(|| anyone_key().0);
        KeyDeriver { root_key }
    }

    /// The identity public key (root key's public key).
    pub fn identity_key(&self) -> PublicKey {
        self.root_key.pub_key()
    }

    /// Derive a private key for the given protocol, key ID, and counterparty.
    pub fn derive_private_key(
        &self,
        protocol: &Protocol,
        key_id: &str,
        counterparty: &Counterparty,
    ) -> Result<PrivateKey, WalletError> {
        let counterparty_key = self.normalize_counterparty(counterparty)?;
        let invoice_number = self.compute_invoice_number(protocol, key_id)?;
        let k = self.root_key.derive_child(&counterparty_key, &invoice_number)?;
        Ok(k)
    }

    /// Derive a public key for the given protocol, key ID, counterparty,
    /// and direction.
    ///
    /// With `for_self` set, this derives the public half of our own child
    /// key (what the counterparty would compute for us); otherwise it
    /// derives the counterparty's child key.
    pub fn derive_public_key(
        &self,
        protocol: &Protocol,
        key_id: &str,
        counterparty: &Counterparty,
        for_self: bool,
    ) -> Result<PublicKey, WalletError> {
        let counterparty_key = self.normalize_counterparty(counterparty)?;
        let invoice_number = self.compute_invoice_number(protocol, key_id)?;

        if for_self {
            let priv_key = self.root_key.derive_child(&counterparty_key, &invoice_number)?;
            Ok(priv_key.pub_key())
        } else {
            let pub_key = counterparty_key.derive_child(&self.root_key, &invoice_number)?;
            Ok(pub_key)
        }
    }

    /// Normalize the counterparty specification into a public key.
    fn normalize_counterparty(&self, counterparty: &Counterparty) -> Result<PublicKey, WalletError> {
        match counterparty.r#type {
            CounterpartyType::Self_ => Ok(self.root_key.pub_key()),
            CounterpartyType::Other => counterparty.counterparty.clone().ok_or_else(|| {
                WalletError::InvalidCounterparty(
                    "counterparty public key required for other".into(),
                )
            }),
            CounterpartyType::Anyone => Ok(anyone_key().1),
            CounterpartyType::Uninitialized => Err(WalletError::InvalidCounterparty(
                "invalid counterparty, must be self, other, or anyone".into(),
            )),
        }
    }

    /// Compute the invoice number string `"{security_level}-{protocol}-{key_id}"`,
    /// validating both parts.
    fn compute_invoice_number(
        &self,
        protocol: &Protocol,
        key_id: &str,
    ) -> Result<String, WalletError> {
        if protocol.security_level < 0 || protocol.security_level > 2 {
            return Err(WalletError::InvalidProtocol(
                "protocol security level must be 0, 1, or 2".into(),
            ));
        }

        if key_id.is_empty() {
            return Err(WalletError::InvalidKeyId(
                "key IDs must be 1 character or more".into(),
            ));
        }
        if key_id.len() > 800 {
            return Err(WalletError::InvalidKeyId(
                "key IDs must be 800 characters or less".into(),
            ));
        }

        let protocol_name = protocol.protocol.trim().to_lowercase();
        if protocol_name.len() < 5 {
            return Err(WalletError::InvalidProtocol(
                "protocol names must be 5 characters or more".into(),
            ));
        }
        if protocol_name.len() > 400 {
            // Linkage revelation protocols carry a key inside the name and
            // get a wider limit.
            if protocol_name.starts_with("specific linkage revelation ") {
                if protocol_name.len() > 430 {
                    return Err(WalletError::InvalidProtocol(
                        "specific linkage revelation protocol names must be 430 characters or less"
                            .into(),
                    ));
                }
            } else {
                return Err(WalletError::InvalidProtocol(
                    "protocol names must be 400 characters or less".into(),
                ));
            }
        }
        if protocol_name.contains("  ") {
            return Err(WalletError::InvalidProtocol(
                "protocol names cannot contain multiple consecutive spaces (\"  \")".into(),
            ));
        }
        if !RE_ONLY_LETTERS_NUMBERS_SPACES.is_match(&protocol_name) {
            return Err(WalletError::InvalidProtocol(
                "protocol names can only contain letters, numbers and spaces".into(),
            ));
        }
        if protocol_name.ends_with(" protocol") {
            return Err(WalletError::InvalidProtocol(
                "no need to end your protocol name with \" protocol\"".into(),
            ));
        }

        Ok(format!(
            "{}-{}-{}",
            protocol.security_level, protocol_name, key_id
        ))
    }
}
