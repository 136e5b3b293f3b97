//! ProtoWallet — a wallet capable of the cryptographic operations the auth
//! protocol needs: identity key lookup, single-use nonces, and sign/verify
//! with BRC-42 derived keys. No transaction management, no blockchain I/O.

use std::collections::HashSet;
use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use middleware_primitives::ec::private_key::PrivateKey;
use middleware_primitives::ec::public_key::PublicKey;
use middleware_primitives::hash::sha256;
use rand::RngCore;

use crate::error::WalletError;
use crate::key_deriver::KeyDeriver;
use crate::types::*;

/// Number of random bytes in a nonce (256 bits).
const NONCE_BYTES_LEN: usize = 32;

/// The wallet operations the auth transport drives.
pub trait WalletInterface: Send + Sync {
    /// Retrieve the identity key or a derived child public key.
    fn get_public_key(&self, args: GetPublicKeyArgs) -> Result<GetPublicKeyResult, WalletError>;

    /// Create a fresh base64 nonce and remember it as self-issued.
    fn create_nonce(&self) -> Result<String, WalletError>;

    /// Check whether a nonce was issued by this wallet. Nonces are
    /// single-use: a successful check consumes the nonce, so a second call
    /// with the same value returns false.
    fn verify_nonce(&self, nonce: &str) -> Result<bool, WalletError>;

    /// Sign SHA-256(data) with the child key derived from the args.
    fn create_signature(
        &self,
        args: CreateSignatureArgs,
    ) -> Result<CreateSignatureResult, WalletError>;

    /// Verify a signature over SHA-256(data) with the derived public key.
    fn verify_signature(
        &self,
        args: VerifySignatureArgs,
    ) -> Result<VerifySignatureResult, WalletError>;
}

/// How to construct a ProtoWallet.
pub enum ProtoWalletArgs {
    /// From a specific root private key.
    PrivateKey(PrivateKey),
    /// From an existing key deriver.
    KeyDeriver(KeyDeriver),
    /// A fresh random root key.
    Random,
}

/// Default wallet implementation over a key deriver plus a nonce registry.
pub struct ProtoWallet {
    key_deriver: KeyDeriver,
    /// Nonces issued by this wallet and not yet consumed. The registry is
    /// taken from atomically so a nonce cannot be accepted twice.
    issued_nonces: Mutex<HashSet<String>>,
}

impl ProtoWallet {
    /// Create a new ProtoWallet from the given construction args.
    pub fn new(args: ProtoWalletArgs) -> Result<Self, WalletError> {
        let key_deriver = match args {
            ProtoWalletArgs::PrivateKey(pk) => KeyDeriver::new(Some(pk)),
            ProtoWalletArgs::KeyDeriver(kd) => kd,
            ProtoWalletArgs::Random => KeyDeriver::new(Some(PrivateKey::new())),
        };
        Ok(ProtoWallet {
            key_deriver,
            issued_nonces: Mutex::new(HashSet::new()),
        })
    }

    /// Convenience: create from a private key.
    pub fn from_private_key(pk: PrivateKey) -> Result<Self, WalletError> {
        Self::new(ProtoWalletArgs::PrivateKey(pk))
    }

    /// The identity public key.
    pub fn identity_key(&self) -> PublicKey {
        self.key_deriver.identity_key()
    }

    /// Access to the underlying key deriver.
    pub fn key_deriver(&self) -> &KeyDeriver {
        &self.key_deriver
    }

    /// Default counterparty to Self if uninitialized.
    fn default_counterparty_self(c: &Counterparty) -> Counterparty {
        if c.r#type == CounterpartyType::Uninitialized {
            Counterparty::self_()
        } else {
            c.clone()
        }
    }

    /// Default counterparty to Anyone if uninitialized.
    fn default_counterparty_anyone(c: &Counterparty) -> Counterparty {
        if c.r#type == CounterpartyType::Uninitialized {
            Counterparty {
                r#type: CounterpartyType::Anyone,
                counterparty: None,
            }
        } else {
            c.clone()
        }
    }
}

impl WalletInterface for ProtoWallet {
    fn get_public_key(&self, args: GetPublicKeyArgs) -> Result<GetPublicKeyResult, WalletError> {
        if args.identity_key {
            return Ok(GetPublicKeyResult {
                public_key: self.key_deriver.identity_key(),
            });
        }

        if args.encryption_args.protocol_id.protocol.is_empty()
            || args.encryption_args.key_id.is_empty()
        {
            return Err(WalletError::InvalidArgument(
                "protocolID and keyID are required if identityKey is false".into(),
            ));
        }

        let counterparty = Self::default_counterparty_self(&args.encryption_args.counterparty);
        let for_self = args.for_self.unwrap_or(false);

        let public_key = self.key_deriver.derive_public_key(
            &args.encryption_args.protocol_id,
            &args.encryption_args.key_id,
            &counterparty,
            for_self,
        )?;

        Ok(GetPublicKeyResult { public_key })
    }

    fn create_nonce(&self) -> Result<String, WalletError> {
        let mut bytes = [0u8; NONCE_BYTES_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = BASE64.encode(bytes);

        let mut registry = self
            .issued_nonces
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        registry.insert(nonce.clone());

        Ok(nonce)
    }

    fn verify_nonce(&self, nonce: &str) -> Result<bool, WalletError> {
        let mut registry = self
            .issued_nonces
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Ok(registry.remove(nonce))
    }

    fn create_signature(
        &self,
        args: CreateSignatureArgs,
    ) -> Result<CreateSignatureResult, WalletError> {
        let counterparty = Self::default_counterparty_anyone(&args.encryption_args.counterparty);

        let priv_key = self.key_deriver.derive_private_key(
            &args.encryption_args.protocol_id,
            &args.encryption_args.key_id,
            &counterparty,
        )?;

        let data_hash = sha256(&args.data);
        let signature = priv_key
            .sign(&data_hash)
            .map_err(|e| WalletError::General(format!("signing failed: {}", e)))?;

        Ok(CreateSignatureResult { signature })
    }

    fn verify_signature(
        &self,
        args: VerifySignatureArgs,
    ) -> Result<VerifySignatureResult, WalletError> {
        if args.data.is_empty() {
            return Err(WalletError::InvalidArgument(
                "data to verify must be provided".into(),
            ));
        }

        let counterparty = Self::default_counterparty_self(&args.encryption_args.counterparty);
        let for_self = args.for_self.unwrap_or(false);

        let pub_key = self.key_deriver.derive_public_key(
            &args.encryption_args.protocol_id,
            &args.encryption_args.key_id,
            &counterparty,
            for_self,
        )?;

        let sig = args.signature.ok_or(WalletError::SignatureNil)?;
        let data_hash = sha256(&args.data);
        let valid = sig.verify(&data_hash, &pub_key);

        Ok(VerifySignatureResult { valid })
    }
}
