use futures_util::future::BoxFuture;
use thiserror::Error;

use super::user::{NewUser, Role, UserRecord};

/// User-facing authentication failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AuthFailure {
    #[error("invalid email")]
    InvalidEmail,
    #[error("account disabled")]
    Disabled,
    #[error("user not found")]
    NotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("too many attempts")]
    RateLimited,
    #[error("email already in use")]
    EmailInUse,
    #[error("weak password")]
    WeakPassword,
    #[error("authentication failed")]
    Unknown,
}

impl AuthFailure {
    pub const ALL: [AuthFailure; 8] = [
        AuthFailure::InvalidEmail,
        AuthFailure::Disabled,
        AuthFailure::NotFound,
        AuthFailure::WrongPassword,
        AuthFailure::RateLimited,
        AuthFailure::EmailInUse,
        AuthFailure::WeakPassword,
        AuthFailure::Unknown,
    ];

    /// Map a provider error code to a category. Accepts both the SDK form
    /// (`auth/user-not-found`) and the REST form (`EMAIL_NOT_FOUND`, optionally
    /// followed by ` : <detail>`). Anything else is `Unknown`.
    pub fn from_provider_code(code: &str) -> AuthFailure {
        let code = code.split(" : ").next().unwrap_or(code).trim();
        match code {
            "auth/invalid-email" | "INVALID_EMAIL" => AuthFailure::InvalidEmail,
            "auth/user-disabled" | "USER_DISABLED" => AuthFailure::Disabled,
            "auth/user-not-found" | "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthFailure::NotFound,
            "auth/wrong-password"
            | "auth/invalid-credential"
            | "auth/invalid-login-credentials"
            | "INVALID_PASSWORD"
            | "INVALID_LOGIN_CREDENTIALS" => AuthFailure::WrongPassword,
            "auth/too-many-requests" | "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthFailure::RateLimited,
            "auth/email-already-in-use" | "auth/email-already-exists" | "EMAIL_EXISTS" => AuthFailure::EmailInUse,
            "auth/weak-password" | "WEAK_PASSWORD" => AuthFailure::WeakPassword,
            _ => AuthFailure::Unknown,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::InvalidEmail => "invalid_email",
            AuthFailure::Disabled => "account_disabled",
            AuthFailure::NotFound => "user_not_found",
            AuthFailure::WrongPassword => "wrong_password",
            AuthFailure::RateLimited => "rate_limited",
            AuthFailure::EmailInUse => "email_in_use",
            AuthFailure::WeakPassword => "weak_password",
            AuthFailure::Unknown => "auth_failed",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            AuthFailure::InvalidEmail => "Neteisingas el. pašto adreso formatas.",
            AuthFailure::Disabled => "Ši paskyra yra išjungta.",
            AuthFailure::NotFound => "Vartotojas su šiuo el. pašto adresu nerastas.",
            AuthFailure::WrongPassword => "Neteisingas slaptažodis.",
            AuthFailure::RateLimited => "Per daug nesėkmingų bandymų. Pabandykite vėliau.",
            AuthFailure::EmailInUse => "Šis el. pašto adresas jau naudojamas.",
            AuthFailure::WeakPassword => "Slaptažodis per silpnas. Naudokite bent 6 simbolius.",
            AuthFailure::Unknown => "Prisijungti nepavyko. Bandykite dar kartą.",
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthFailure),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Capability set of an external identity backend.
///
/// Calls are never retried here; a rate-limited answer is surfaced as
/// `AuthFailure::RateLimited` and transport problems as `IdentityError::Unavailable`.
pub trait IdentityProvider: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn verify_credentials<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>>;

    /// Exchange a client-obtained id token for the account it was issued to.
    fn verify_id_token<'a>(&'a self, id_token: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>>;

    fn get_user<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>>;

    fn get_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>>;

    fn create_user<'a>(&'a self, req: &'a NewUser) -> BoxFuture<'a, Result<UserRecord, IdentityError>>;

    /// Privileged: change the role claim of an account.
    fn set_role<'a>(&'a self, uid: &'a str, role: Role) -> BoxFuture<'a, Result<UserRecord, IdentityError>>;

    /// Privileged: enable or disable sign-in for an account.
    fn set_disabled<'a>(&'a self, uid: &'a str, disabled: bool) -> BoxFuture<'a, Result<UserRecord, IdentityError>>;
}
