use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use crate::tprintln;

use super::provider::{AuthFailure, IdentityError, IdentityProvider};
use super::user::User;

pub type SessionToken = String;

/// Five days, the longest lifetime a browser session cookie gets by default.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user: User,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<SessionToken, Session>,
    by_user: HashMap<String, HashSet<SessionToken>>,
}

impl SessionTable {
    fn drop_token(&mut self, token: &str) -> Option<Session> {
        let sess = self.sessions.remove(token)?;
        if let Some(set) = self.by_user.get_mut(&sess.user.uid) {
            set.remove(token);
            if set.is_empty() { self.by_user.remove(&sess.user.uid); }
        }
        Some(sess)
    }
}

/// Issues, verifies and removes opaque session tokens.
///
/// Constructed once per process and shared through the server state; clones share
/// the same table.
#[derive(Clone)]
pub struct SessionManager {
    table: Arc<RwLock<SessionTable>>,
    ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(DEFAULT_SESSION_TTL) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { table: Arc::new(RwLock::new(SessionTable::default())), ttl }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    /// Mint a session for an identity the caller has already verified upstream.
    pub fn issue(&self, user: User) -> Result<Session, IdentityError> {
        let token = crate::security::random_token().map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        let now = Instant::now();
        let sess = Session { token: token.clone(), user, issued_at: now, expires_at: now + self.ttl };
        {
            let mut t = self.table.write();
            t.by_user.entry(sess.user.uid.clone()).or_default().insert(token.clone());
            t.sessions.insert(token, sess.clone());
        }
        tprintln!("session.issue user={} ttl_secs={}", sess.user.uid, self.ttl.as_secs());
        Ok(sess)
    }

    /// Verify a client id token with the provider, then mint a session for it.
    pub async fn create_session(&self, provider: &dyn IdentityProvider, id_token: &str) -> Result<Session, IdentityError> {
        let record = provider.verify_id_token(id_token).await?;
        if record.disabled {
            return Err(AuthFailure::Disabled.into());
        }
        self.issue(record.user)
    }

    /// Resolve a presented token. Absent, unknown, expired and revoked tokens all
    /// resolve to `None`; expired entries are dropped on the way.
    pub fn verify(&self, token: &str) -> Option<User> {
        let now = Instant::now();
        let expired = {
            let t = self.table.read();
            match t.sessions.get(token) {
                Some(sess) if sess.expires_at > now => return Some(sess.user.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.table.write().drop_token(token);
        }
        None
    }

    /// Returns whether a session was removed. Removing an unknown token is not an error.
    pub fn remove(&self, token: &str) -> bool {
        self.table.write().drop_token(token).is_some()
    }

    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut t = self.table.write();
        let tokens = t.by_user.remove(user_id).unwrap_or_default();
        let mut count = 0usize;
        for tok in tokens.iter() {
            if t.sessions.remove(tok).is_some() { count += 1; }
        }
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }

    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut t = self.table.write();
        let stale: Vec<SessionToken> = t.sessions.iter()
            .filter(|(_, s)| s.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for tok in stale.iter() {
            t.drop_token(tok);
        }
        stale.len()
    }

    pub fn len(&self) -> usize { self.table.read().sessions.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn user(uid: &str) -> User {
        User { uid: uid.into(), email: format!("{uid}@example.com"), display_name: None, role: Role::User }
    }

    #[test]
    fn issue_then_verify_round_trip() {
        let sm = SessionManager::default();
        let s = sm.issue(user("u1")).unwrap();
        assert_eq!(sm.verify(&s.token).map(|u| u.uid), Some("u1".to_string()));
    }

    #[test]
    fn unknown_token_is_anonymous() {
        let sm = SessionManager::default();
        assert!(sm.verify("").is_none());
        assert!(sm.verify("nope").is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let sm = SessionManager::default();
        let s = sm.issue(user("u1")).unwrap();
        assert!(sm.remove(&s.token));
        assert!(!sm.remove(&s.token));
        assert!(sm.verify(&s.token).is_none());
    }

    #[test]
    fn expired_sessions_do_not_verify_and_are_pruned() {
        let sm = SessionManager::new(Duration::ZERO);
        let s = sm.issue(user("u1")).unwrap();
        assert_eq!(sm.len(), 1);
        assert!(sm.verify(&s.token).is_none());
        assert_eq!(sm.len(), 0);
    }

    #[test]
    fn sweep_drops_only_expired() {
        let short = SessionManager::new(Duration::ZERO);
        short.issue(user("a")).unwrap();
        short.issue(user("b")).unwrap();
        assert_eq!(short.sweep_expired(), 2);
        assert!(short.is_empty());

        let long = SessionManager::default();
        long.issue(user("a")).unwrap();
        assert_eq!(long.sweep_expired(), 0);
        assert_eq!(long.len(), 1);
    }

    #[test]
    fn revoke_user_drops_all_of_their_sessions() {
        let sm = SessionManager::default();
        let a1 = sm.issue(user("a")).unwrap();
        let a2 = sm.issue(user("a")).unwrap();
        let b = sm.issue(user("b")).unwrap();
        assert_eq!(sm.revoke_user("a"), 2);
        assert!(sm.verify(&a1.token).is_none());
        assert!(sm.verify(&a2.token).is_none());
        assert!(sm.verify(&b.token).is_some());
        assert_eq!(sm.revoke_user("a"), 0);
    }

    #[test]
    fn clones_share_the_table() {
        let sm = SessionManager::default();
        let other = sm.clone();
        let s = sm.issue(user("u1")).unwrap();
        assert!(other.verify(&s.token).is_some());
        other.remove(&s.token);
        assert!(sm.verify(&s.token).is_none());
    }
}
