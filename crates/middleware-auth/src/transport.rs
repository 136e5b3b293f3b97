//! The authentication transport state machine.
//!
//! Stateless per request; sessions live in the session manager and nonces
//! in the wallet, both internally synchronised. One instance serves
//! concurrent requests.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use middleware_primitives::ec::public_key::PublicKey;
use middleware_primitives::ec::signature::Signature;
use middleware_wallet::types::*;
use middleware_wallet::WalletInterface;

use crate::brc104::filter_and_sort_headers;
use crate::certificates::VerifiableCertificate;
use crate::error::AuthError;
use crate::payload::ResponsePayload;
use crate::session_manager::SessionManager;
use crate::types::*;
use crate::utils;

/// The application's verdict on a batch of received certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateDecision {
    /// Authorise the peer; the session becomes authenticated.
    Accept,
    /// Decline with a reason, surfaced to the peer as 403.
    Reject(String),
}

/// Application hook invoked with the sender's identity key and the
/// certificates it presented.
pub type OnCertificatesReceived =
    Arc<dyn Fn(&str, &[VerifiableCertificate]) -> CertificateDecision + Send + Sync>;

/// Outcome of processing an inbound auth message.
#[derive(Debug)]
pub enum TransportReply {
    /// A protocol reply to serialise back to the peer.
    Message(AuthMessage),
    /// The application callback declined the certificates; the exchange is
    /// complete and the reason goes back as 403.
    Declined(String),
}

/// The server-side auth transport.
pub struct Transport {
    wallet: Arc<dyn WalletInterface>,
    session_manager: Arc<dyn SessionManager>,
    allow_unauthenticated: bool,
    certificate_requirements: Option<RequestedCertificateSet>,
    on_certificates_received: Option<OnCertificatesReceived>,
}

impl Transport {
    /// Create a new transport over the given collaborators.
    pub fn new(
        wallet: Arc<dyn WalletInterface>,
        session_manager: Arc<dyn SessionManager>,
        allow_unauthenticated: bool,
        certificate_requirements: Option<RequestedCertificateSet>,
        on_certificates_received: Option<OnCertificatesReceived>,
    ) -> Self {
        tracing::debug!(allow_unauthenticated, "creating auth transport");
        Transport {
            wallet,
            session_manager,
            allow_unauthenticated,
            certificate_requirements,
            on_certificates_received,
        }
    }

    /// Whether unauthenticated pass-through is enabled.
    pub fn allow_unauthenticated(&self) -> bool {
        self.allow_unauthenticated
    }

    /// Process an inbound auth message and produce the reply.
    pub fn handle_incoming_message(&self, msg: &AuthMessage) -> Result<TransportReply, AuthError> {
        if msg.version != AUTH_VERSION {
            return Err(AuthError::UnsupportedVersion(msg.version.clone()));
        }

        match msg.message_type {
            MessageType::InitialRequest => self
                .handle_initial_request(msg)
                .map(TransportReply::Message),
            MessageType::CertificateResponse => self.handle_certificate_response(msg),
            MessageType::General => self
                .handle_general_message(msg)
                .map(TransportReply::Message),
            MessageType::InitialResponse | MessageType::CertificateRequest => {
                Err(AuthError::NotImplemented)
            }
        }
    }

    /// Sign the captured response so the client can verify server identity.
    ///
    /// `msg` is the `general` reply template produced while handling the
    /// request; its nonce keys the signature together with the session's
    /// peer nonce, so the emitted headers and the signature agree.
    pub fn handle_response(
        &self,
        identity_key: &str,
        request_id: &str,
        status: u16,
        headers: &[(String, String)],
        body: &[u8],
        msg: &mut AuthMessage,
    ) -> Result<(), AuthError> {
        let session = self.session_manager.get_session(identity_key)?;
        let peer_key = session
            .peer_identity_key
            .clone()
            .ok_or_else(|| AuthError::Internal("session has no peer identity key".into()))?;

        let payload = ResponsePayload {
            request_id: BASE64.decode(request_id)?,
            status: status as i64,
            headers: filter_and_sort_headers(headers),
            body: body.to_vec(),
        }
        .to_bytes();

        let response_nonce = msg
            .nonce
            .clone()
            .ok_or_else(|| AuthError::Internal("response message is missing its nonce".into()))?;

        let sig = self.wallet.create_signature(CreateSignatureArgs {
            encryption_args: Self::auth_encryption_args(
                Self::key_id(&response_nonce, &session.peer_nonce),
                peer_key,
            ),
            data: payload,
        })?;
        msg.signature = Some(sig.signature.to_der());

        Ok(())
    }

    fn handle_initial_request(&self, msg: &AuthMessage) -> Result<AuthMessage, AuthError> {
        if msg.identity_key.is_empty() || msg.initial_nonce.is_empty() {
            return Err(AuthError::BadRequest(
                "missing required fields in initial request".into(),
            ));
        }
        let peer_key = PublicKey::from_hex(&msg.identity_key)
            .map_err(|e| AuthError::BadRequest(format!("invalid identity key: {}", e)))?;

        let session_nonce = self.wallet.create_nonce()?;
        self.session_manager.add_session(PeerSession {
            is_authenticated: self.certificate_requirements.is_none(),
            session_nonce: session_nonce.clone(),
            peer_nonce: msg.initial_nonce.clone(),
            peer_identity_key: Some(peer_key.clone()),
            last_update: now_ms(),
        })?;
        tracing::debug!(peer = %msg.identity_key, "session created for initial request");

        let signature =
            self.create_non_general_auth_signature(&msg.initial_nonce, &session_nonce, &peer_key)?;

        let mut response = AuthMessage::new(MessageType::InitialResponse, self.identity_key_hex()?);
        response.initial_nonce = session_nonce;
        response.your_nonce = Some(msg.initial_nonce.clone());
        response.signature = Some(signature);
        response.requested_certificates = self.certificate_requirements.clone();

        Ok(response)
    }

    fn handle_certificate_response(&self, msg: &AuthMessage) -> Result<TransportReply, AuthError> {
        let your_nonce = msg.your_nonce.as_deref().unwrap_or_default();
        if your_nonce.is_empty() || !self.wallet.verify_nonce(your_nonce)? {
            return Err(AuthError::Unauthorized("unable to verify nonce".into()));
        }

        let certificates = msg
            .certificates
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AuthError::BadRequest("no certificates provided in certificate response".into())
            })?;
        let nonce = msg
            .nonce
            .as_deref()
            .ok_or_else(|| AuthError::BadRequest("missing nonce in certificate response".into()))?;

        let session = self.session_manager.get_session(&msg.identity_key)?;
        let peer_key = session
            .peer_identity_key
            .clone()
            .ok_or_else(|| AuthError::Unauthorized("session has no peer identity key".into()))?;

        let signature = Self::parse_signature(msg)?;
        let cert_payload = serde_json::to_vec(certificates)?;

        let result = self.wallet.verify_signature(VerifySignatureArgs {
            encryption_args: Self::auth_encryption_args(
                Self::key_id(nonce, your_nonce),
                peer_key.clone(),
            ),
            data: cert_payload,
            signature: Some(signature),
            for_self: None,
        })?;
        if !result.valid {
            return Err(AuthError::Unauthorized("unable to verify signature".into()));
        }

        utils::validate_certificates(
            &msg.identity_key,
            certificates,
            self.certificate_requirements.as_ref(),
        )?;

        if let Some(callback) = &self.on_certificates_received {
            match callback(&msg.identity_key, certificates) {
                CertificateDecision::Accept => {}
                CertificateDecision::Reject(reason) => {
                    tracing::debug!(peer = %msg.identity_key, %reason, "certificates declined by application");
                    return Ok(TransportReply::Declined(reason));
                }
            }
        }

        let session = self
            .session_manager
            .mutate_session(&msg.identity_key, &mut |s| {
                s.is_authenticated = true;
                s.last_update = now_ms();
            })?;
        tracing::debug!(peer = %msg.identity_key, "certificate verification successful");

        let response_nonce = self.wallet.create_nonce()?;
        let signature = self.create_non_general_auth_signature(
            &msg.initial_nonce,
            &session.session_nonce,
            &peer_key,
        )?;

        let mut response =
            AuthMessage::new(MessageType::CertificateResponse, self.identity_key_hex()?);
        response.nonce = Some(response_nonce);
        response.your_nonce = Some(session.peer_nonce.clone());
        response.signature = Some(signature);

        Ok(TransportReply::Message(response))
    }

    fn handle_general_message(&self, msg: &AuthMessage) -> Result<AuthMessage, AuthError> {
        let your_nonce = msg.your_nonce.as_deref().unwrap_or_default();
        if your_nonce.is_empty() || !self.wallet.verify_nonce(your_nonce)? {
            return Err(AuthError::Unauthorized("unable to verify nonce".into()));
        }

        // The first general request echoes the session nonce itself; later
        // ones echo a fresher per-response nonce, so fall back to the
        // sender's identity key.
        let session = self
            .session_manager
            .get_session(your_nonce)
            .or_else(|_| self.session_manager.get_session(&msg.identity_key))?;

        if !session.is_authenticated && !self.allow_unauthenticated {
            if self.certificate_requirements.is_some() {
                return Err(AuthError::Unauthorized("no certificates provided".into()));
            }
            return Err(AuthError::NotAuthenticated);
        }

        let peer_key = session
            .peer_identity_key
            .clone()
            .ok_or_else(|| AuthError::Unauthorized("session has no peer identity key".into()))?;
        let nonce = msg
            .nonce
            .as_deref()
            .ok_or_else(|| AuthError::BadRequest("missing nonce".into()))?;
        let payload = msg
            .payload
            .clone()
            .ok_or_else(|| AuthError::BadRequest("missing request payload".into()))?;
        let signature = Self::parse_signature(msg)?;

        let result = self.wallet.verify_signature(VerifySignatureArgs {
            encryption_args: Self::auth_encryption_args(
                Self::key_id(nonce, your_nonce),
                peer_key,
            ),
            data: payload,
            signature: Some(signature),
            for_self: None,
        })?;
        if !result.valid {
            return Err(AuthError::Unauthorized("unable to verify signature".into()));
        }

        self.session_manager
            .mutate_session(&session.session_nonce, &mut |s| {
                s.last_update = now_ms();
            })?;

        let response_nonce = self.wallet.create_nonce()?;
        let mut response = AuthMessage::new(MessageType::General, self.identity_key_hex()?);
        response.nonce = Some(response_nonce);
        response.your_nonce = Some(session.peer_nonce.clone());

        Ok(response)
    }

    /// Sign `base64(initial_nonce ‖ session_nonce)` under a key ID of the
    /// two nonces concatenated, for initial and certificate responses.
    fn create_non_general_auth_signature(
        &self,
        initial_nonce: &str,
        session_nonce: &str,
        peer_key: &PublicKey,
    ) -> Result<Vec<u8>, AuthError> {
        let combined = format!("{}{}", initial_nonce, session_nonce);
        let data = BASE64.encode(combined.as_bytes()).into_bytes();

        let sig = self.wallet.create_signature(CreateSignatureArgs {
            encryption_args: Self::auth_encryption_args(combined, peer_key.clone()),
            data,
        })?;
        Ok(sig.signature.to_der())
    }

    fn parse_signature(msg: &AuthMessage) -> Result<Signature, AuthError> {
        let bytes = msg
            .signature
            .as_deref()
            .ok_or_else(|| AuthError::BadRequest("missing signature".into()))?;
        Signature::from_der(bytes)
            .map_err(|e| AuthError::BadRequest(format!("failed to parse signature: {}", e)))
    }

    fn identity_key_hex(&self) -> Result<String, AuthError> {
        let result = self.wallet.get_public_key(GetPublicKeyArgs::identity())?;
        Ok(result.public_key.to_hex())
    }

    fn key_id(prefix: &str, suffix: &str) -> String {
        format!("{} {}", prefix, suffix)
    }

    fn auth_encryption_args(key_id: String, peer_key: PublicKey) -> EncryptionArgs {
        EncryptionArgs {
            protocol_id: default_auth_protocol(),
            key_id,
            counterparty: Counterparty::other(peer_key),
        }
    }
}
