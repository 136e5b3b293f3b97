//! End-to-end tests of the axum middleware: handshake over
//! `/.well-known/auth`, authenticated general requests with verifiable
//! response signatures, certificate gating, and nonce replay.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use middleware_auth::certificates::{Certificate, FieldValue, VerifiableCertificate};
use middleware_auth::http::{AuthContext, AuthMiddleware, Config};
use middleware_auth::transport::CertificateDecision;
use middleware_auth::types::{AuthMessage, MessageType, RequestedCertificateSet};
use middleware_wallet::proto_wallet::ProtoWallet;

use common::*;

async fn ping(req: Request) -> &'static str {
    // The downstream handler sees the identity context on authenticated
    // requests.
    if req.headers().contains_key("x-bsv-auth-request-id") {
        assert!(req.extensions().get::<AuthContext>().is_some());
    }
    "Pong!"
}

fn app(mw: Arc<AuthMiddleware>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/", get(ping))
        .layer(axum::middleware::from_fn_with_state(
            mw,
            AuthMiddleware::handle,
        ))
}

fn server_config(wallet: Arc<ProtoWallet>) -> Config {
    Config {
        wallet: Some(wallet),
        ..Config::default()
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

fn response_header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn response_header_pairs(response: &Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                v.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// POST the handshake body and return the parsed initialResponse.
async fn handshake(app: &Router, body: &AuthMessage) -> AuthMessage {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/.well-known/auth")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn signed_get(path_and_query: &str, headers: &[(String, String)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path_and_query);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn handshake_returns_signed_initial_response() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let app = app(AuthMiddleware::new(server_config(server.clone())).unwrap());

    let request = initial_request_body(&client);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/.well-known/auth")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_header(&response, "x-bsv-auth-message-type").as_deref(),
        Some("initialResponse")
    );
    assert_eq!(
        response_header(&response, "x-bsv-auth-your-nonce").as_deref(),
        Some(request.initial_nonce.as_str())
    );
    assert_eq!(
        response_header(&response, "x-bsv-auth-identity-key").as_deref(),
        Some(server.identity_key().to_hex().as_str())
    );

    let reply: AuthMessage = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(reply.message_type, MessageType::InitialResponse);
    assert_eq!(reply.your_nonce.as_deref(), Some(request.initial_nonce.as_str()));
    assert!(!reply.initial_nonce.is_empty());
    assert_ne!(reply.initial_nonce, request.initial_nonce);

    assert!(verify_non_general_signature(
        &client,
        &reply.identity_key,
        &request.initial_nonce,
        &reply.initial_nonce,
        reply.signature.as_deref().unwrap(),
    ));
}

#[tokio::test]
async fn malformed_handshake_body_is_bad_request() {
    let app = app(AuthMiddleware::new(Config::default()).unwrap());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/.well-known/auth")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn general_request_without_request_id_is_unauthorized() {
    let app = app(AuthMiddleware::new(Config::default()).unwrap());

    let response = app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_bytes(response).await, b"missing request ID");
}

#[tokio::test]
async fn allow_unauthenticated_passes_through_without_signing() {
    let app = app(
        AuthMiddleware::new(Config {
            allow_unauthenticated: true,
            ..Config::default()
        })
        .unwrap(),
    );

    let response = app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response_header(&response, "x-bsv-auth-signature").is_none());
    assert_eq!(body_bytes(response).await, b"Pong!");
}

#[tokio::test]
async fn authenticated_general_request_gets_signed_response() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let app = app(AuthMiddleware::new(server_config(server.clone())).unwrap());

    let request = initial_request_body(&client);
    let reply = handshake(&app, &request).await;

    let headers = general_request_headers(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        "GET",
        "/ping",
        None,
        b"",
    );
    let response = app.clone().oneshot(signed_get("/ping", &headers)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_header(&response, "x-bsv-auth-message-type").as_deref(),
        Some("general")
    );

    // request-id on the response equals the client's request nonce.
    let request_nonce = headers
        .iter()
        .find(|(name, _)| name == "x-bsv-auth-nonce")
        .map(|(_, value)| value.clone())
        .unwrap();
    assert_eq!(
        response_header(&response, "x-bsv-auth-request-id").as_deref(),
        Some(request_nonce.as_str())
    );

    let response_nonce = response_header(&response, "x-bsv-auth-nonce").unwrap();
    let signature = hex::decode(response_header(&response, "x-bsv-auth-signature").unwrap()).unwrap();
    let response_headers = response_header_pairs(&response);

    let body = body_bytes(response).await;
    assert_eq!(body, b"Pong!");

    assert!(verify_response_signature(
        &client,
        &reply.identity_key,
        &request.initial_nonce,
        &request_nonce,
        200,
        &response_headers,
        &body,
        &response_nonce,
        &signature,
    ));
}

#[tokio::test]
async fn replayed_nonce_is_unauthorized() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let app = app(AuthMiddleware::new(server_config(server)).unwrap());

    let reply = handshake(&app, &initial_request_body(&client)).await;

    let first = general_request_headers(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        "GET",
        "/ping",
        None,
        b"",
    );
    let response = app.clone().oneshot(signed_get("/ping", &first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Echoing the already-consumed session nonce again is a replay.
    let second = general_request_headers(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        "GET",
        "/ping",
        None,
        b"",
    );
    let response = app.clone().oneshot(signed_get("/ping", &second)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_bytes(response).await, b"unable to verify nonce");
}

#[tokio::test]
async fn tampered_request_signature_is_unauthorized() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let app = app(AuthMiddleware::new(server_config(server)).unwrap());

    let reply = handshake(&app, &initial_request_body(&client)).await;

    // Sign for /ping but request /, so the reproduced payload differs.
    let headers = general_request_headers(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        "GET",
        "/ping",
        None,
        b"",
    );
    let response = app.oneshot(signed_get("/", &headers)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_bytes(response).await, b"unable to verify signature");
}

fn age_gated_config(server: Arc<ProtoWallet>, certifier: String) -> Config {
    let requirements = RequestedCertificateSet {
        certifiers: vec![certifier.clone()],
        certificate_types: BTreeMap::from([(
            "age-verification".to_string(),
            vec!["age".to_string()],
        )]),
    };

    let on_certs: middleware_auth::OnCertificatesReceived = Arc::new(move |sender, certs| {
        let valid = certs.iter().any(|c| {
            c.certificate.subject == sender
                && c.certificate.certifier == certifier
                && c.certificate.cert_type == "age-verification"
                && c.certificate
                    .fields
                    .get("age")
                    .and_then(|v| v.as_i64())
                    .is_some_and(|age| age >= 18)
        });
        if valid {
            CertificateDecision::Accept
        } else {
            CertificateDecision::Reject(
                "Age verification failed. Must be 18 or older.".into(),
            )
        }
    });

    Config {
        wallet: Some(server),
        certificates_to_request: Some(requirements),
        on_certificates_received: Some(on_certs),
        ..Config::default()
    }
}

fn age_certificate(subject: &str, certifier: &str, age: &str) -> VerifiableCertificate {
    VerifiableCertificate::new(
        Certificate {
            cert_type: "age-verification".into(),
            subject: subject.into(),
            serial_number: "12345".into(),
            certifier: certifier.into(),
            fields: BTreeMap::from([("age".to_string(), FieldValue::String(age.into()))]),
            signature: "mocksignature".into(),
            ..Certificate::default()
        },
        BTreeMap::from([("age".to_string(), "symmetricKeyToField".to_string())]),
    )
}

#[tokio::test]
async fn certificate_required_blocks_general_requests() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let certifier = make_wallet(7).identity_key().to_hex();
    let app = app(AuthMiddleware::new(age_gated_config(server, certifier)).unwrap());

    let reply = handshake(&app, &initial_request_body(&client)).await;
    assert!(reply.requested_certificates.is_some());

    let headers = general_request_headers(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        "GET",
        "/ping",
        None,
        b"",
    );
    let response = app.oneshot(signed_get("/ping", &headers)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_bytes(response).await, b"no certificates provided");
}

#[tokio::test]
async fn accepted_certificate_authenticates_the_session() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let certifier = make_wallet(7).identity_key().to_hex();
    let app = app(AuthMiddleware::new(age_gated_config(server, certifier.clone())).unwrap());

    let reply = handshake(&app, &initial_request_body(&client)).await;

    let cert = age_certificate(&client.identity_key().to_hex(), &certifier, "18");
    let cert_message = certificate_response_body(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        vec![cert],
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/.well-known/auth")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&cert_message).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cert_reply: AuthMessage = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(cert_reply.message_type, MessageType::CertificateResponse);

    // The session is authenticated; a general request echoing the fresh
    // server nonce goes through.
    let headers = general_request_headers(
        &client,
        &reply.identity_key,
        cert_reply.nonce.as_deref().unwrap(),
        "GET",
        "/ping",
        None,
        b"",
    );
    let response = app.oneshot(signed_get("/ping", &headers)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"Pong!");
}

#[tokio::test]
async fn underage_certificate_is_forbidden() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let certifier = make_wallet(7).identity_key().to_hex();
    let app = app(AuthMiddleware::new(age_gated_config(server, certifier.clone())).unwrap());

    let reply = handshake(&app, &initial_request_body(&client)).await;

    let cert = age_certificate(&client.identity_key().to_hex(), &certifier, "17");
    let cert_message = certificate_response_body(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        vec![cert],
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/.well-known/auth")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&cert_message).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("18 or older"));
}

#[tokio::test]
async fn query_string_is_bound_into_the_signature() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let app = app(AuthMiddleware::new(server_config(server)).unwrap());

    let reply = handshake(&app, &initial_request_body(&client)).await;

    let headers = general_request_headers(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        "GET",
        "/ping",
        Some("q=1"),
        b"",
    );
    let response = app
        .clone()
        .oneshot(signed_get("/ping?q=1", &headers))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same signature against a different query string fails.
    let reply2 = handshake(&app, &initial_request_body(&client)).await;
    let headers = general_request_headers(
        &client,
        &reply2.identity_key,
        &reply2.initial_nonce,
        "GET",
        "/ping",
        Some("q=1"),
        b"",
    );
    let response = app
        .oneshot(signed_get("/ping?q=2", &headers))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_auth_headers_are_bad_request() {
    let server = make_wallet(1);
    let client = make_wallet(2);
    let app = app(AuthMiddleware::new(server_config(server)).unwrap());

    let reply = handshake(&app, &initial_request_body(&client)).await;

    let headers = general_request_headers(
        &client,
        &reply.identity_key,
        &reply.initial_nonce,
        "GET",
        "/ping",
        None,
        b"",
    );

    // Drop the version header; keep request-id so the general path engages.
    let stripped: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name != "x-bsv-auth-version")
        .cloned()
        .collect();
    let response = app.oneshot(signed_get("/ping", &stripped)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"missing version header");
}
