//!
//! picnic HTTP server
//! ------------------
//! Axum router for the booking site backend.
//!
//! Responsibilities:
//! - Session cookie handling on top of `identity::SessionManager`.
//! - Auth endpoints (id-token exchange, password login, signup, logout, me).
//! - Booking submission and the admin bookings list.
//! - Public and admin review endpoints with the sample-data fallback.
//! - Admin gate for API routes (401/403) and pages (redirect to login).
//! - Sitemap and a background sweeper for expired sessions.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{routing::{get, patch, post}, Router, Json, extract::{FromRequestParts, State, rejection::JsonRejection}};
use axum::http::{header, request::Parts, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{IdentityMode, ServerConfig, StoreMode};
use crate::error::{AppError, AppResult, MSG_FORBIDDEN};
use crate::identity::{
    login_redirect, require_admin, AttemptLimit, DenyReason, Gate, IdentityProvider, LocalIdentityProvider,
    RestIdentityProvider, Role, SessionManager, User,
};
use crate::store::{DocumentStore, FileStore, MemoryStore, UnavailableStore};

pub mod auth;
pub mod bookings;
pub mod reviews;
pub mod admin;

pub const SESSION_COOKIE: &str = "session";

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared handles for every request. Clones share the same provider, sessions and store.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn IdentityProvider>,
    pub sessions: SessionManager,
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>, config: ServerConfig) -> Self {
        let sessions = SessionManager::new(config.session_ttl);
        Self { provider, sessions, store, config: Arc::new(config) }
    }

    /// Build the identity provider and document store the configuration asks for.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let provider: Arc<dyn IdentityProvider> = match config.identity {
            IdentityMode::Local => {
                let local = LocalIdentityProvider::new(AttemptLimit::default());
                if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
                    local.add_user(email, password, Some("Administratorius"), Role::Admin)
                        .map_err(|e| anyhow::anyhow!("seeding admin account {}: {}", email, e))?;
                    info!(target: "startup", "seeded local admin account {}", email);
                } else {
                    warn!(target: "startup", "no PICNIC_ADMIN_EMAIL/PICNIC_ADMIN_PASSWORD set; local identity starts without an admin");
                }
                Arc::new(local)
            }
            IdentityMode::Rest => {
                let api_key = config.api_key.as_deref().context("PICNIC_API_KEY is required for identity mode 'rest'")?;
                Arc::new(RestIdentityProvider::new(
                    &config.identity_url,
                    api_key,
                    config.identity_admin_token.clone(),
                    config.http_timeout,
                )?)
            }
        };
        let store: Arc<dyn DocumentStore> = match config.store {
            StoreMode::Memory => Arc::new(MemoryStore::new()),
            StoreMode::File => Arc::new(FileStore::open(&config.data_dir)
                .with_context(|| format!("While opening file store at {}", config.data_dir.display()))?),
            StoreMode::None => {
                warn!(target: "startup", "running without a document store; listings serve sample data");
                Arc::new(UnavailableStore)
            }
        };
        Ok(Self::new(provider, store, config))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "picnic ok" }))
        .route("/api/auth/session", post(auth::create_session))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/bookings", post(bookings::submit))
        .route("/api/admin/bookings", get(bookings::admin_list))
        .route("/api/reviews", get(reviews::public_list).post(reviews::submit))
        .route("/api/admin/reviews", get(reviews::admin_list))
        .route("/api/admin/reviews/{id}", patch(reviews::moderate).delete(reviews::delete))
        .route("/api/admin/users/{uid}/role", post(admin::set_role))
        .route("/api/admin/users/{uid}/disabled", post(admin::set_disabled))
        .route("/admin", get(admin::dashboard))
        .route("/sitemap.xml", get(sitemap))
        .with_state(state)
}

async fn sitemap(State(state): State<AppState>) -> impl IntoResponse {
    let xml = crate::sitemap::render(&state.config.site_url, Utc::now());
    ([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml)
}

/// Drop expired sessions periodically so abandoned cookies do not pile up.
pub fn spawn_session_sweeper(sessions: SessionManager, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            let removed = sessions.sweep_expired();
            if removed > 0 { tracing::debug!(target: "picnic::auth", removed = removed, "session_sweep"); }
        }
    })
}

/// Serve on an already bound listener. Tests bind port 0 and call this directly.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let sweeper = spawn_session_sweeper(state.sessions.clone(), SWEEP_INTERVAL);
    let app = build_router(state);
    let res = axum::serve(listener, app).await;
    sweeper.abort();
    res?;
    Ok(())
}

pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    let http_port = config.http_port;
    let state = AppState::from_config(config)?;
    info!(
        target: "startup",
        "identity={} store={} session_ttl_secs={} secure_cookies={}",
        state.provider.backend_name(),
        state.store.backend_name(),
        state.sessions.ttl().as_secs(),
        state.config.secure_cookies,
    );
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!(target: "startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("While binding {}", addr))?;
    serve(listener, state).await
}

// --- cookies ---

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some(eq) = p.find('=') {
                let (k, v) = p.split_at(eq);
                if k == name && v.len() > 1 { return Some(v[1..].to_string()); }
            }
        }
    }
    None
}

pub(crate) fn session_cookie(token: &str, ttl: Duration, secure: bool) -> AppResult<HeaderValue> {
    let mut s = format!("{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}", SESSION_COOKIE, token, ttl.as_secs());
    if secure { s.push_str("; Secure"); }
    HeaderValue::from_str(&s).map_err(|e| AppError::from(anyhow::anyhow!("session cookie header: {}", e)))
}

pub(crate) fn clear_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
    }
}

/// Unwrap a JSON body, turning axum's rejection into a localized 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match body {
        Ok(Json(v)) => Ok(v),
        Err(rej) => {
            tracing::debug!("rejected request body: {}", rej.body_text());
            Err(AppError::user("invalid_body", "Užklausos turinys neteisingas."))
        }
    }
}

// --- extractors ---

/// Signed-in user if the request carries a live session cookie. Never rejects.
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = parse_cookie(&parts.headers, SESSION_COOKIE).and_then(|tok| state.sessions.verify(&tok));
        Ok(CurrentUser(user))
    }
}

/// Any signed-in user; anonymous requests get 401.
pub struct SignedIn(pub User);

impl FromRequestParts<AppState> for SignedIn {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await.unwrap_or(CurrentUser(None));
        user.map(SignedIn).ok_or_else(AppError::unauthorized)
    }
}

/// Admin gate for API routes: 401 when anonymous, 403 when signed in without the role.
pub struct AdminApi(pub User);

impl FromRequestParts<AppState> for AdminApi {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await.unwrap_or(CurrentUser(None));
        match (require_admin(user.as_ref()), user) {
            (Gate::Allow, Some(u)) => Ok(AdminApi(u)),
            (Gate::Deny(DenyReason::NotAdmin), Some(u)) => {
                warn!(target: "picnic::auth", "admin api denied uid={} path={}", u.uid, parts.uri.path());
                Err(AppError::forbidden("forbidden", MSG_FORBIDDEN))
            }
            _ => Err(AppError::unauthorized()),
        }
    }
}

/// Admin gate for pages: anything short of an admin session is sent to the login page.
pub struct AdminPage(pub User);

impl FromRequestParts<AppState> for AdminPage {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await.unwrap_or(CurrentUser(None));
        match user {
            Some(u) if require_admin(Some(&u)).is_allowed() => Ok(AdminPage(u)),
            _ => {
                let target = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/admin");
                Err(Redirect::to(&login_redirect(target)).into_response())
            }
        }
    }
}
