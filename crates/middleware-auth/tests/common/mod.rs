//! Client-side helpers shared by the integration tests: building handshake
//! bodies, signing general request headers, and verifying server
//! signatures, the way a real client wallet would.

#![allow(dead_code)]

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use middleware_auth::brc104::*;
use middleware_auth::payload::{RequestPayload, ResponsePayload};
use middleware_auth::types::{AuthMessage, MessageType, AUTH_VERSION};
use middleware_primitives::ec::private_key::PrivateKey;
use middleware_primitives::ec::public_key::PublicKey;
use middleware_primitives::ec::signature::Signature;
use middleware_wallet::proto_wallet::{ProtoWallet, WalletInterface};
use middleware_wallet::types::*;

/// Deterministic wallet from a one-byte seed.
pub fn make_wallet(val: u8) -> Arc<ProtoWallet> {
    let mut bytes = [0u8; 32];
    bytes[31] = val;
    let key = PrivateKey::from_bytes(&bytes).unwrap();
    Arc::new(ProtoWallet::from_private_key(key).unwrap())
}

/// The JSON body a client posts to `/.well-known/auth` to open a session.
pub fn initial_request_body(client: &ProtoWallet) -> AuthMessage {
    let mut msg = AuthMessage::new(MessageType::InitialRequest, client.identity_key().to_hex());
    msg.initial_nonce = client.create_nonce().unwrap();
    msg
}

fn auth_args(key_id: String, counterparty_hex: &str) -> EncryptionArgs {
    EncryptionArgs {
        protocol_id: default_auth_protocol(),
        key_id,
        counterparty: Counterparty::other(PublicKey::from_hex(counterparty_hex).unwrap()),
    }
}

/// Compute the full `x-bsv-auth-*` header set for a general request,
/// signing the canonical payload exactly as the server will rebuild it.
pub fn general_request_headers(
    client: &ProtoWallet,
    server_identity_key: &str,
    your_nonce: &str,
    method: &str,
    path: &str,
    query: Option<&str>,
    body: &[u8],
) -> Vec<(String, String)> {
    let request_nonce = client.create_nonce().unwrap();

    let mut headers = vec![
        (HEADER_VERSION.to_string(), AUTH_VERSION.to_string()),
        (
            HEADER_IDENTITY_KEY.to_string(),
            client.identity_key().to_hex(),
        ),
        (HEADER_NONCE.to_string(), request_nonce.clone()),
        (HEADER_YOUR_NONCE.to_string(), your_nonce.to_string()),
        (HEADER_REQUEST_ID.to_string(), request_nonce.clone()),
    ];

    let payload = RequestPayload {
        request_id: BASE64.decode(&request_nonce).unwrap(),
        method: method.to_string(),
        path: path.to_string(),
        query: query.map(str::to_string),
        headers: filter_and_sort_headers(&headers),
        body: body.to_vec(),
    }
    .to_bytes();

    let sig = client
        .create_signature(CreateSignatureArgs {
            encryption_args: auth_args(
                format!("{} {}", request_nonce, your_nonce),
                server_identity_key,
            ),
            data: payload,
        })
        .unwrap();

    headers.push((
        HEADER_SIGNATURE.to_string(),
        hex::encode(sig.signature.to_der()),
    ));
    headers
}

/// Verify the signature on an `initialResponse` (or `certificateResponse`)
/// envelope: data is `base64(initialNonce ‖ sessionNonce)` under a key ID
/// of the two nonces concatenated.
pub fn verify_non_general_signature(
    client: &ProtoWallet,
    server_identity_key: &str,
    initial_nonce: &str,
    session_nonce: &str,
    signature: &[u8],
) -> bool {
    let combined = format!("{}{}", initial_nonce, session_nonce);
    let data = BASE64.encode(combined.as_bytes()).into_bytes();

    let sig = Signature::from_der(signature).unwrap();
    client
        .verify_signature(VerifySignatureArgs {
            encryption_args: auth_args(combined, server_identity_key),
            data,
            signature: Some(sig),
            for_self: None,
        })
        .unwrap()
        .valid
}

/// Verify the server's signature over a captured general response.
pub fn verify_response_signature(
    client: &ProtoWallet,
    server_identity_key: &str,
    client_initial_nonce: &str,
    request_id: &str,
    status: u16,
    response_headers: &[(String, String)],
    body: &[u8],
    response_nonce: &str,
    signature: &[u8],
) -> bool {
    let payload = ResponsePayload {
        request_id: BASE64.decode(request_id).unwrap(),
        status: status as i64,
        headers: filter_and_sort_headers(response_headers),
        body: body.to_vec(),
    }
    .to_bytes();

    let sig = Signature::from_der(signature).unwrap();
    client
        .verify_signature(VerifySignatureArgs {
            encryption_args: auth_args(
                format!("{} {}", response_nonce, client_initial_nonce),
                server_identity_key,
            ),
            data: payload,
            signature: Some(sig),
            for_self: None,
        })
        .unwrap()
        .valid
}

/// Build a signed general AuthMessage over an arbitrary payload, for
/// driving the transport directly.
pub fn general_message(
    client: &ProtoWallet,
    server_identity_key: &str,
    your_nonce: &str,
    payload: Vec<u8>,
) -> AuthMessage {
    let nonce = client.create_nonce().unwrap();

    let sig = client
        .create_signature(CreateSignatureArgs {
            encryption_args: auth_args(format!("{} {}", nonce, your_nonce), server_identity_key),
            data: payload.clone(),
        })
        .unwrap();

    let mut msg = AuthMessage::new(MessageType::General, client.identity_key().to_hex());
    msg.nonce = Some(nonce);
    msg.your_nonce = Some(your_nonce.to_string());
    msg.payload = Some(payload);
    msg.signature = Some(sig.signature.to_der());
    msg
}

/// Build and sign a `certificateResponse` envelope for the given
/// certificates, echoing the server's session nonce.
pub fn certificate_response_body(
    client: &ProtoWallet,
    server_identity_key: &str,
    session_nonce: &str,
    certificates: Vec<middleware_auth::certificates::VerifiableCertificate>,
) -> AuthMessage {
    let nonce = client.create_nonce().unwrap();

    let mut msg = AuthMessage::new(
        MessageType::CertificateResponse,
        client.identity_key().to_hex(),
    );
    msg.nonce = Some(nonce.clone());
    msg.your_nonce = Some(session_nonce.to_string());

    let cert_payload = serde_json::to_vec(&certificates).unwrap();
    let sig = client
        .create_signature(CreateSignatureArgs {
            encryption_args: auth_args(
                format!("{} {}", nonce, session_nonce),
                server_identity_key,
            ),
            data: cert_payload,
        })
        .unwrap();

    msg.certificates = Some(certificates);
    msg.signature = Some(sig.signature.to_der());
    msg
}
