//! Tests for the session manager.

use middleware_auth::session_manager::{DefaultSessionManager, SessionManager};
use middleware_auth::types::PeerSession;
use middleware_primitives::ec::private_key::PrivateKey;

fn session(nonce: &str, key: Option<&PrivateKey>) -> PeerSession {
    PeerSession {
        is_authenticated: false,
        session_nonce: nonce.to_string(),
        peer_nonce: format!("peer-{}", nonce),
        peer_identity_key: key.map(|k| k.pub_key()),
        last_update: 1000,
    }
}

#[test]
fn add_get_remove() {
    let manager = DefaultSessionManager::new();
    let pk = PrivateKey::new();
    let key_hex = pk.pub_key().to_hex();

    manager.add_session(session("nonce-1", Some(&pk))).unwrap();

    // Both index keys resolve to the same record.
    let by_nonce = manager.get_session("nonce-1").unwrap();
    let by_key = manager.get_session(&key_hex).unwrap();
    assert_eq!(by_nonce.session_nonce, by_key.session_nonce);
    assert_eq!(by_nonce.peer_nonce, by_key.peer_nonce);

    assert!(manager.has_session("nonce-1"));
    assert!(manager.has_session(&key_hex));
    assert!(!manager.has_session("nonexistent"));

    manager.remove_session(&key_hex);
    assert!(manager.get_session("nonce-1").is_err());
    assert!(manager.get_session(&key_hex).is_err());
}

#[test]
fn update_preserves_both_indices() {
    let manager = DefaultSessionManager::new();
    let pk = PrivateKey::new();
    let key_hex = pk.pub_key().to_hex();

    manager.add_session(session("nonce-1", Some(&pk))).unwrap();

    let mut updated = manager.get_session("nonce-1").unwrap();
    updated.is_authenticated = true;
    updated.last_update = 2000;
    manager.update_session(updated);

    assert!(manager.get_session("nonce-1").unwrap().is_authenticated);
    assert!(manager.get_session(&key_hex).unwrap().is_authenticated);
    assert_eq!(manager.get_session(&key_hex).unwrap().last_update, 2000);
}

#[test]
fn mutate_session_applies_atomically_under_either_key() {
    let manager = DefaultSessionManager::new();
    let pk = PrivateKey::new();
    let key_hex = pk.pub_key().to_hex();

    manager.add_session(session("nonce-1", Some(&pk))).unwrap();

    let updated = manager
        .mutate_session(&key_hex, &mut |s| {
            s.is_authenticated = true;
            s.last_update = 3000;
        })
        .unwrap();
    assert!(updated.is_authenticated);

    let by_nonce = manager.get_session("nonce-1").unwrap();
    assert!(by_nonce.is_authenticated);
    assert_eq!(by_nonce.last_update, 3000);

    assert!(manager
        .mutate_session("nonexistent", &mut |_| {})
        .is_err());
}

#[test]
fn rejects_empty_session_nonce() {
    let manager = DefaultSessionManager::new();
    let result = manager.add_session(PeerSession {
        is_authenticated: false,
        session_nonce: String::new(),
        peer_nonce: String::new(),
        peer_identity_key: None,
        last_update: 0,
    });
    assert!(result.is_err());
}

#[test]
fn session_without_identity_key_is_nonce_indexed_only() {
    let manager = DefaultSessionManager::new();
    manager.add_session(session("nonce-solo", None)).unwrap();

    assert!(manager.has_session("nonce-solo"));
    let retrieved = manager.get_session("nonce-solo").unwrap();
    assert!(retrieved.peer_identity_key.is_none());

    manager.remove_session("nonce-solo");
    assert!(!manager.has_session("nonce-solo"));
}
