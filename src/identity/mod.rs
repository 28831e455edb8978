//! Central identity and session management for the booking site.
//! Keep the public surface thin and split implementation across sub-modules.

mod user;
mod session;
mod provider;
mod local;
mod rest;
mod authorizer;

pub use user::{Role, User, UserRecord, NewUser};
pub use session::{Session, SessionToken, SessionManager, DEFAULT_SESSION_TTL};
pub use provider::{AuthFailure, IdentityError, IdentityProvider};
pub use local::{LocalIdentityProvider, AttemptLimit};
pub use rest::{RestIdentityProvider, role_from_custom_attributes, DEFAULT_IDENTITY_URL};
pub use authorizer::{Gate, DenyReason, require_admin, login_redirect};
