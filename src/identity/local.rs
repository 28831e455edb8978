//! In-process identity backend: Argon2 password hashes, locally issued id tokens and a
//! per-email failed-attempt limiter. Used for development, single-node deployments
//! and tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use tracing::info;

use super::provider::{AuthFailure, IdentityError, IdentityProvider};
use super::user::{NewUser, Role, User, UserRecord};
use crate::fields;

const MIN_PASSWORD_LEN: usize = 6;
const ID_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Failed sign-ins allowed per email inside `window` before the account is
/// reported as rate limited.
#[derive(Debug, Clone, Copy)]
pub struct AttemptLimit {
    pub max_failures: u32,
    pub window: Duration,
}

impl Default for AttemptLimit {
    fn default() -> Self { Self { max_failures: 5, window: Duration::from_secs(15 * 60) } }
}

#[derive(Debug)]
struct Attempts {
    failures: u32,
    window_start: Instant,
}

#[derive(Debug)]
struct LocalAccount {
    record: UserRecord,
    password_hash: String,
}

#[derive(Debug, Default)]
struct Directory {
    accounts: HashMap<String, LocalAccount>,
    by_email: HashMap<String, String>,
    id_tokens: HashMap<String, (String, Instant)>,
}

pub struct LocalIdentityProvider {
    dir: RwLock<Directory>,
    attempts: Mutex<HashMap<String, Attempts>>,
    limit: AttemptLimit,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self { Self::new(AttemptLimit::default()) }
}

fn email_key(email: &str) -> String { email.trim().to_ascii_lowercase() }

impl LocalIdentityProvider {
    pub fn new(limit: AttemptLimit) -> Self {
        Self { dir: RwLock::new(Directory::default()), attempts: Mutex::new(HashMap::new()), limit }
    }

    /// Register an account directly, bypassing the signup flow (seeding, tests).
    pub fn add_user(&self, email: &str, password: &str, display_name: Option<&str>, role: Role) -> Result<UserRecord, IdentityError> {
        if !fields::is_email(email.trim()) {
            return Err(AuthFailure::InvalidEmail.into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthFailure::WeakPassword.into());
        }
        let key = email_key(email);
        if self.dir.read().by_email.contains_key(&key) {
            return Err(AuthFailure::EmailInUse.into());
        }
        let password_hash = crate::security::hash_password(password).map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        let uid = uuid::Uuid::new_v4().simple().to_string();
        let record = UserRecord {
            user: User { uid: uid.clone(), email: email.trim().to_string(), display_name: display_name.map(|s| s.to_string()), role },
            disabled: false,
        };
        let mut dir = self.dir.write();
        // re-check under the write lock; a concurrent signup may have won
        if dir.by_email.contains_key(&key) {
            return Err(AuthFailure::EmailInUse.into());
        }
        dir.by_email.insert(key, uid.clone());
        dir.accounts.insert(uid, LocalAccount { record: record.clone(), password_hash });
        info!(target: "picnic::auth", "local account created uid={} role={}", record.user.uid, role.as_str());
        Ok(record)
    }

    /// Issue an id token for an account, standing in for the client-side SDK.
    pub fn issue_id_token(&self, uid: &str) -> Result<String, IdentityError> {
        let token = crate::security::random_token().map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        let mut dir = self.dir.write();
        if !dir.accounts.contains_key(uid) {
            return Err(AuthFailure::NotFound.into());
        }
        dir.id_tokens.insert(token.clone(), (uid.to_string(), Instant::now() + ID_TOKEN_TTL));
        Ok(token)
    }

    fn is_limited(&self, key: &str) -> bool {
        let mut attempts = self.attempts.lock();
        match attempts.get(key) {
            Some(a) if a.window_start.elapsed() > self.limit.window => {
                attempts.remove(key);
                false
            }
            Some(a) => a.failures >= self.limit.max_failures,
            None => false,
        }
    }

    fn record_failure(&self, key: &str) {
        let mut attempts = self.attempts.lock();
        let window = self.limit.window;
        attempts.retain(|_, a| a.window_start.elapsed() <= window);
        let entry = attempts.entry(key.to_string()).or_insert(Attempts { failures: 0, window_start: Instant::now() });
        if entry.window_start.elapsed() > self.limit.window {
            entry.failures = 0;
            entry.window_start = Instant::now();
        }
        entry.failures += 1;
    }

    fn check_credentials(&self, email: &str, password: &str) -> Result<UserRecord, IdentityError> {
        if !fields::is_email(email.trim()) {
            return Err(AuthFailure::InvalidEmail.into());
        }
        let key = email_key(email);
        if self.is_limited(&key) {
            return Err(AuthFailure::RateLimited.into());
        }
        let found = {
            let dir = self.dir.read();
            dir.by_email.get(&key)
                .and_then(|uid| dir.accounts.get(uid))
                .map(|acct| (acct.record.clone(), acct.password_hash.clone()))
        };
        let Some((record, hash)) = found else {
            self.record_failure(&key);
            return Err(AuthFailure::NotFound.into());
        };
        if record.disabled {
            return Err(AuthFailure::Disabled.into());
        }
        if !crate::security::verify_password(&hash, password) {
            self.record_failure(&key);
            return Err(AuthFailure::WrongPassword.into());
        }
        self.attempts.lock().remove(&key);
        Ok(record)
    }

    fn lookup_token(&self, id_token: &str) -> Result<UserRecord, IdentityError> {
        let mut dir = self.dir.write();
        let uid = match dir.id_tokens.get(id_token) {
            Some((uid, exp)) if *exp > Instant::now() => uid.clone(),
            Some(_) => {
                dir.id_tokens.remove(id_token);
                return Err(AuthFailure::Unknown.into());
            }
            None => return Err(AuthFailure::Unknown.into()),
        };
        dir.accounts.get(&uid).map(|a| a.record.clone()).ok_or_else(|| AuthFailure::NotFound.into())
    }

    fn lookup_uid(&self, uid: &str) -> Result<UserRecord, IdentityError> {
        self.dir.read().accounts.get(uid).map(|a| a.record.clone()).ok_or_else(|| AuthFailure::NotFound.into())
    }

    fn lookup_email(&self, email: &str) -> Result<UserRecord, IdentityError> {
        let dir = self.dir.read();
        dir.by_email.get(&email_key(email))
            .and_then(|uid| dir.accounts.get(uid))
            .map(|a| a.record.clone())
            .ok_or_else(|| AuthFailure::NotFound.into())
    }

    fn change_disabled(&self, uid: &str, disabled: bool) -> Result<UserRecord, IdentityError> {
        let mut dir = self.dir.write();
        let acct = dir.accounts.get_mut(uid).ok_or(AuthFailure::NotFound)?;
        acct.record.disabled = disabled;
        info!(target: "picnic::auth", "local account disabled={} uid={}", disabled, uid);
        Ok(acct.record.clone())
    }

    fn change_role(&self, uid: &str, role: Role) -> Result<UserRecord, IdentityError> {
        let mut dir = self.dir.write();
        let acct = dir.accounts.get_mut(uid).ok_or(AuthFailure::NotFound)?;
        acct.record.user.role = role;
        info!(target: "picnic::auth", "local account role changed uid={} role={}", uid, role.as_str());
        Ok(acct.record.clone())
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn backend_name(&self) -> &'static str { "local" }

    fn verify_credentials<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move { self.check_credentials(email, password) }.boxed()
    }

    fn verify_id_token<'a>(&'a self, id_token: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move { self.lookup_token(id_token) }.boxed()
    }

    fn get_user<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move { self.lookup_uid(uid) }.boxed()
    }

    fn get_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move { self.lookup_email(email) }.boxed()
    }

    fn create_user<'a>(&'a self, req: &'a NewUser) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move { self.add_user(&req.email, &req.password, req.display_name.as_deref(), Role::User) }.boxed()
    }

    fn set_role<'a>(&'a self, uid: &'a str, role: Role) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move { self.change_role(uid, role) }.boxed()
    }

    fn set_disabled<'a>(&'a self, uid: &'a str, disabled: bool) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move { self.change_disabled(uid, disabled) }.boxed()
    }
}
