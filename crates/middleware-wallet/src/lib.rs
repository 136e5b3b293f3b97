//! Wallet layer for the BSV auth middleware.
//!
//! Provides the `WalletInterface` the auth transport drives (identity key,
//! single-use nonces, sign/verify with derived keys) and the BRC-42/43
//! `KeyDeriver` that turns `(protocol, key ID, counterparty)` into child
//! keys on both sides of a session.

pub mod key_deriver;
pub mod proto_wallet;
pub mod types;

mod error;

pub use error::WalletError;
pub use key_deriver::KeyDeriver;
pub use proto_wallet::{ProtoWallet, ProtoWalletArgs, WalletInterface};
