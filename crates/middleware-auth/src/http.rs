//! HTTP adapter — axum middleware binding the auth transport to requests.
//!
//! `POST /.well-known/auth` carries the JSON envelope; every other route is
//! a general request whose context travels in `x-bsv-auth-*` headers. The
//! downstream response is buffered so the transport can sign over its
//! status and body before anything is flushed.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use middleware_wallet::proto_wallet::{ProtoWallet, ProtoWalletArgs};
use middleware_wallet::WalletInterface;

use crate::brc104::*;
use crate::error::AuthError;
use crate::payload::RequestPayload;
use crate::session_manager::{DefaultSessionManager, SessionManager};
use crate::transport::{OnCertificatesReceived, Transport, TransportReply};
use crate::types::{AuthMessage, MessageType, RequestedCertificateSet};
use crate::utils;

/// Identity context attached to authenticated requests for downstream
/// handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The authenticated peer's identity key (hex).
    pub identity_key: String,
    /// The request ID, equal to the client's request nonce.
    pub request_id: String,
}

/// Configuration for the auth middleware.
#[derive(Default)]
pub struct Config {
    /// Pass unauthenticated general requests through to the handler with
    /// no identity context and no response signing.
    pub allow_unauthenticated: bool,
    /// Wallet for nonces and signatures. Defaults to a fresh random-key
    /// proto wallet.
    pub wallet: Option<Arc<dyn WalletInterface>>,
    /// Session store. Defaults to the in-memory manager.
    pub session_manager: Option<Arc<dyn SessionManager>>,
    /// When set, clients must present matching certificates before they
    /// become authenticated.
    pub certificates_to_request: Option<RequestedCertificateSet>,
    /// Application hook deciding whether presented certificates authorise
    /// the peer.
    pub on_certificates_received: Option<OnCertificatesReceived>,
}

/// BRC-103/104 authentication middleware.
///
/// ```ignore
/// let mw = AuthMiddleware::new(Config::default())?;
/// let app = Router::new()
///     .route("/ping", get(ping))
///     .layer(axum::middleware::from_fn_with_state(mw, AuthMiddleware::handle));
/// ```
pub struct AuthMiddleware {
    transport: Transport,
}

impl AuthMiddleware {
    /// Create the middleware from its configuration. Fails when the
    /// certificate requirement set is malformed or the default wallet
    /// cannot be constructed.
    pub fn new(cfg: Config) -> Result<Arc<Self>, AuthError> {
        if let Some(reqs) = &cfg.certificates_to_request {
            utils::validate_requested_certificate_set(reqs)?;
        }

        let wallet: Arc<dyn WalletInterface> = match cfg.wallet {
            Some(wallet) => wallet,
            None => Arc::new(ProtoWallet::new(ProtoWalletArgs::Random)?),
        };
        let session_manager = cfg
            .session_manager
            .unwrap_or_else(|| Arc::new(DefaultSessionManager::new()));

        tracing::debug!(
            allow_unauthenticated = cfg.allow_unauthenticated,
            "creating auth middleware"
        );

        Ok(Arc::new(AuthMiddleware {
            transport: Transport::new(
                wallet,
                session_manager,
                cfg.allow_unauthenticated,
                cfg.certificates_to_request,
                cfg.on_certificates_received,
            ),
        }))
    }

    /// The axum middleware entry point.
    pub async fn handle(
        State(mw): State<Arc<AuthMiddleware>>,
        req: Request,
        next: Next,
    ) -> Response {
        if req.method() == Method::POST && req.uri().path() == AUTH_ENDPOINT {
            return mw.handle_non_general_request(req).await;
        }
        mw.handle_general_request(req, next).await
    }

    /// Handle the `/.well-known/auth` envelope: handshake and certificate
    /// exchange.
    async fn handle_non_general_request(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let bytes = match to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return error_response(&AuthError::Internal(format!(
                    "failed to read request body: {}",
                    e
                )))
            }
        };

        let msg: AuthMessage = match serde_json::from_slice(&bytes) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(error = %e, "invalid request body");
                return error_response(&AuthError::BadRequest(
                    "failed to decode request body".into(),
                ));
            }
        };

        // Non-general replies echo the initial nonce as their request ID
        // unless the client set one explicitly.
        let request_id = header_str(&parts.headers, HEADER_REQUEST_ID)
            .unwrap_or_else(|| msg.initial_nonce.clone());

        match self.transport.handle_incoming_message(&msg) {
            Ok(TransportReply::Message(reply)) => {
                let body = match serde_json::to_vec(&reply) {
                    Ok(body) => body,
                    Err(e) => {
                        return error_response(&AuthError::Internal(format!(
                            "failed to marshal response: {}",
                            e
                        )))
                    }
                };

                let mut response = (StatusCode::OK, body).into_response();
                set_auth_headers(response.headers_mut(), &reply, &request_id);
                response.headers_mut().insert(
                    axum::http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            Ok(TransportReply::Declined(reason)) => {
                (StatusCode::FORBIDDEN, reason).into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to process request");
                error_response(&e)
            }
        }
    }

    /// Handle a general application request: authenticate, run the
    /// downstream handler, sign the captured response.
    async fn handle_general_request(&self, req: Request, next: Next) -> Response {
        let Some(request_id) = header_str(req.headers(), HEADER_REQUEST_ID) else {
            if self.transport.allow_unauthenticated() {
                tracing::debug!("unauthenticated requests are allowed, skipping auth");
                return next.run(req).await;
            }
            tracing::debug!("missing request ID and unauthenticated requests are not allowed");
            return error_response(&AuthError::Unauthorized("missing request ID".into()));
        };

        if let Err(e) = check_headers(req.headers()) {
            return error_response(&e);
        }

        let (parts, body) = req.into_parts();
        let body_bytes = match to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return error_response(&AuthError::Internal(format!(
                    "failed to read request body: {}",
                    e
                )))
            }
        };

        let msg = match build_auth_message(&parts, &body_bytes, &request_id) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(error = %e, "failed to build request data");
                return error_response(&e);
            }
        };

        let mut reply = match self.transport.handle_incoming_message(&msg) {
            Ok(TransportReply::Message(reply)) => reply,
            Ok(TransportReply::Declined(reason)) => {
                return (StatusCode::FORBIDDEN, reason).into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to process request");
                return error_response(&e);
            }
        };

        let mut req = Request::from_parts(parts, Body::from(body_bytes));
        req.extensions_mut().insert(AuthContext {
            identity_key: msg.identity_key.clone(),
            request_id: request_id.clone(),
        });

        let response = next.run(req).await;

        // Capture status, headers, and body before anything is flushed so
        // the signature covers what actually goes out.
        let (mut res_parts, res_body) = response.into_parts();
        let res_bytes = match to_bytes(res_body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return error_response(&AuthError::Internal(format!(
                    "failed to capture response body: {}",
                    e
                )))
            }
        };

        // The auth headers (minus the signature, which cannot sign itself)
        // must be present before signing: the header filter binds them
        // into the signed payload, and the client reproduces the payload
        // from the headers it receives.
        set_auth_headers(&mut res_parts.headers, &reply, &request_id);

        let response_headers = header_pairs(&res_parts.headers);
        if let Err(e) = self.transport.handle_response(
            &msg.identity_key,
            &request_id,
            res_parts.status.as_u16(),
            &response_headers,
            &res_bytes,
            &mut reply,
        ) {
            tracing::error!(error = %e, "failed to sign response");
            return error_response(&AuthError::Internal(format!(
                "failed to sign response: {}",
                e
            )));
        }

        if let Some(signature) = &reply.signature {
            insert_header(&mut res_parts.headers, HEADER_SIGNATURE, &hex::encode(signature));
        }
        Response::from_parts(res_parts, Body::from(res_bytes))
    }
}

/// Read the `x-bsv-auth-*` headers into a general AuthMessage, building the
/// canonical request payload from the request itself.
fn build_auth_message(
    parts: &Parts,
    body: &[u8],
    request_id: &str,
) -> Result<AuthMessage, AuthError> {
    let request_id_bytes = BASE64
        .decode(request_id)
        .map_err(|_| AuthError::BadRequest("invalid request ID".into()))?;
    if request_id_bytes.len() != REQUEST_ID_LENGTH {
        return Err(AuthError::BadRequest("invalid request ID length".into()));
    }

    let headers = header_pairs(&parts.headers);
    let payload = RequestPayload {
        request_id: request_id_bytes,
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: filter_and_sort_headers(&headers),
        body: body.to_vec(),
    }
    .to_bytes();

    let mut msg = AuthMessage::new(
        MessageType::General,
        header_str(&parts.headers, HEADER_IDENTITY_KEY).unwrap_or_default(),
    );
    msg.version = header_str(&parts.headers, HEADER_VERSION).unwrap_or_default();
    msg.nonce = header_str(&parts.headers, HEADER_NONCE);
    msg.your_nonce = header_str(&parts.headers, HEADER_YOUR_NONCE);
    msg.payload = Some(payload);

    if let Some(signature) = header_str(&parts.headers, HEADER_SIGNATURE) {
        let decoded = hex::decode(&signature)
            .map_err(|_| AuthError::BadRequest("error decoding signature".into()))?;
        msg.signature = Some(decoded);
    }

    Ok(msg)
}

/// Require the full general-request header set: version, identity key,
/// base64 nonces, hex signature.
fn check_headers(headers: &HeaderMap) -> Result<(), AuthError> {
    if header_str(headers, HEADER_VERSION).is_none() {
        return Err(AuthError::BadRequest("missing version header".into()));
    }
    if header_str(headers, HEADER_IDENTITY_KEY).is_none() {
        return Err(AuthError::BadRequest("missing identity key header".into()));
    }

    match header_str(headers, HEADER_NONCE) {
        None => return Err(AuthError::BadRequest("missing nonce header".into())),
        Some(nonce) if BASE64.decode(&nonce).is_err() => {
            return Err(AuthError::BadRequest("invalid nonce header".into()))
        }
        _ => {}
    }

    match header_str(headers, HEADER_YOUR_NONCE) {
        None => return Err(AuthError::BadRequest("missing your nonce header".into())),
        Some(nonce) if BASE64.decode(&nonce).is_err() => {
            return Err(AuthError::BadRequest("invalid your nonce header".into()))
        }
        _ => {}
    }

    match header_str(headers, HEADER_SIGNATURE) {
        None => return Err(AuthError::BadRequest("missing signature header".into())),
        Some(sig) if sig.len() % 2 != 0 || hex::decode(&sig).is_err() => {
            return Err(AuthError::BadRequest("invalid signature header".into()))
        }
        _ => {}
    }

    Ok(())
}

/// Write the outgoing auth headers for a reply message. `request-id` is set
/// only on general responses and echoes the client's request nonce.
fn set_auth_headers(headers: &mut HeaderMap, msg: &AuthMessage, request_id: &str) {
    insert_header(headers, HEADER_VERSION, &msg.version);
    insert_header(headers, HEADER_MESSAGE_TYPE, &msg.message_type.to_string());
    insert_header(headers, HEADER_IDENTITY_KEY, &msg.identity_key);

    if msg.message_type == MessageType::General {
        insert_header(headers, HEADER_REQUEST_ID, request_id);
    }
    if let Some(nonce) = &msg.nonce {
        insert_header(headers, HEADER_NONCE, nonce);
    }
    if let Some(your_nonce) = &msg.your_nonce {
        insert_header(headers, HEADER_YOUR_NONCE, your_nonce);
    }
    if let Some(signature) = &msg.signature {
        insert_header(headers, HEADER_SIGNATURE, &hex::encode(signature));
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

fn error_response(err: &AuthError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}
