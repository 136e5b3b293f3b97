//! Session manager — binds peer identity keys to session nonces.
//!
//! Every session is indexed under both its session nonce and the peer's
//! identity key, and both keys always resolve to the same record.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::AuthError;
use crate::types::PeerSession;

/// Trait for managing peer sessions.
pub trait SessionManager: Send + Sync {
    /// Insert a session under both its nonce and identity key indices.
    fn add_session(&self, session: PeerSession) -> Result<(), AuthError>;
    /// Replace an existing session, preserving both index entries.
    fn update_session(&self, session: PeerSession);
    /// Look up a session by session nonce or identity key hex.
    fn get_session(&self, identifier: &str) -> Result<PeerSession, AuthError>;
    /// Atomically apply `f` to the session found under `identifier` and
    /// return the updated record.
    fn mutate_session(
        &self,
        identifier: &str,
        f: &mut dyn FnMut(&mut PeerSession),
    ) -> Result<PeerSession, AuthError>;
    /// Remove a session by identity key (or session nonce), dropping both
    /// index entries.
    fn remove_session(&self, identity_key: &str);
    /// Whether a session exists under the given identifier.
    fn has_session(&self, identifier: &str) -> bool;
}

/// Default in-memory session manager.
///
/// A single map carries each session twice, once per index key, so the
/// lookup invariant holds by construction.
pub struct DefaultSessionManager {
    sessions: RwLock<HashMap<String, PeerSession>>,
}

impl DefaultSessionManager {
    pub fn new() -> Self {
        DefaultSessionManager {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for DefaultSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The two index keys of a session: its nonce, and the identity key hex
/// when the peer key is known.
fn index_keys(session: &PeerSession) -> (String, Option<String>) {
    (
        session.session_nonce.clone(),
        session.peer_identity_key.as_ref().map(|k| k.to_hex()),
    )
}

fn insert_both(map: &mut HashMap<String, PeerSession>, session: PeerSession) {
    let (nonce, key_hex) = index_keys(&session);
    if let Some(key_hex) = key_hex {
        map.insert(key_hex, session.clone());
    }
    map.insert(nonce, session);
}

impl SessionManager for DefaultSessionManager {
    fn add_session(&self, session: PeerSession) -> Result<(), AuthError> {
        if session.session_nonce.is_empty() {
            return Err(AuthError::Internal(
                "invalid session: session_nonce is required".into(),
            ));
        }

        let mut map = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        insert_both(&mut map, session);
        Ok(())
    }

    fn update_session(&self, session: PeerSession) {
        if session.session_nonce.is_empty() {
            return;
        }
        let mut map = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        insert_both(&mut map, session);
    }

    fn get_session(&self, identifier: &str) -> Result<PeerSession, AuthError> {
        let map = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        map.get(identifier).cloned().ok_or(AuthError::SessionNotFound)
    }

    fn mutate_session(
        &self,
        identifier: &str,
        f: &mut dyn FnMut(&mut PeerSession),
    ) -> Result<PeerSession, AuthError> {
        let mut map = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let mut session = map.get(identifier).cloned().ok_or(AuthError::SessionNotFound)?;
        f(&mut session);
        insert_both(&mut map, session.clone());
        Ok(session)
    }

    fn remove_session(&self, identity_key: &str) {
        let mut map = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = map.remove(identity_key) {
            let (nonce, key_hex) = index_keys(&session);
            map.remove(&nonce);
            if let Some(key_hex) = key_hex {
                map.remove(&key_hex);
            }
        }
    }

    fn has_session(&self, identifier: &str) -> bool {
        let map = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        map.contains_key(identifier)
    }
}
