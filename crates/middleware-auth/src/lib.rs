//! BRC-103/104 server-side authentication for HTTP.
//!
//! Binds every exchange to signed identity keys on the secp256k1 curve:
//! peers handshake over `/.well-known/auth`, optionally present verifiable
//! certificates, and then carry per-request signatures in `x-bsv-auth-*`
//! headers. Server responses are signed back so clients can verify server
//! identity.

pub mod brc104;
pub mod certificates;
pub mod error;
pub mod http;
pub mod payload;
pub mod session_manager;
pub mod transport;
pub mod types;
pub mod utils;

pub use error::AuthError;
pub use http::{AuthContext, AuthMiddleware, Config};
pub use session_manager::{DefaultSessionManager, SessionManager};
pub use transport::{CertificateDecision, OnCertificatesReceived, Transport, TransportReply};
pub use types::*;
