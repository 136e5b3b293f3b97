#![deny(missing_docs)]

//! BSV middleware — BRC-103/104 mutual authentication for HTTP servers.
//!
//! Re-exports all middleware components for convenient single-crate usage.

pub use middleware_auth as auth;
pub use middleware_primitives as primitives;
pub use middleware_wallet as wallet;
