//! Shared harness: the real router on an ephemeral port, backed by the local
//! identity provider and a caller-chosen document store.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use picnic::config::ServerConfig;
use picnic::identity::{LocalIdentityProvider, Role, UserRecord};
use picnic::server::{serve, AppState};
use picnic::store::{DocumentStore, MemoryStore};

pub const ADMIN_EMAIL: &str = "admin@piknikai.lt";
pub const ADMIN_PASSWORD: &str = "admin-slaptazodis";
pub const USER_EMAIL: &str = "jonas@example.com";
pub const USER_PASSWORD: &str = "jonas-slaptazodis";

pub struct TestApp {
    pub base: String,
    pub local: Arc<LocalIdentityProvider>,
    pub state: AppState,
    pub admin: UserRecord,
    pub user: UserRecord,
    handle: JoinHandle<()>,
}

impl Drop for TestApp {
    fn drop(&mut self) { self.handle.abort(); }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String { format!("{}{}", self.base, path) }

    /// Log in through the HTTP endpoint and return the raw session token.
    pub async fn login(&self, client: &reqwest::Client, email: &str, password: &str) -> Result<String> {
        let resp = client.post(self.url("/api/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send().await?;
        anyhow::ensure!(resp.status() == 200, "login failed: {}", resp.status());
        session_token(&resp).ok_or_else(|| anyhow::anyhow!("no session cookie"))
    }

    pub async fn me(&self, client: &reqwest::Client, token: &str) -> Result<Value> {
        let resp = client.get(self.url("/api/auth/me")).header(COOKIE, format!("session={}", token)).send().await?;
        Ok(resp.json().await?)
    }
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(Arc::new(MemoryStore::new()), ServerConfig::default()).await
}

pub async fn spawn_app_with(store: Arc<dyn DocumentStore>, mut cfg: ServerConfig) -> Result<TestApp> {
    // plain http in tests; Secure cookies would never be sent back
    cfg.secure_cookies = false;
    let local = Arc::new(LocalIdentityProvider::default());
    let admin = local.add_user(ADMIN_EMAIL, ADMIN_PASSWORD, Some("Administratorė"), Role::Admin)?;
    let user = local.add_user(USER_EMAIL, USER_PASSWORD, Some("Jonas K"), Role::User)?;
    let state = AppState::new(local.clone(), store, cfg);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server_state = state.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, server_state).await { eprintln!("test server error: {e:?}"); }
    });
    Ok(TestApp { base: format!("http://{}", addr), local, state, admin, user, handle })
}

/// Client without redirects or a cookie jar; tests pass the cookie explicitly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("reqwest client")
}

pub fn session_token(resp: &reqwest::Response) -> Option<String> {
    resp.headers().get_all(SET_COOKIE).iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|s| s.strip_prefix("session="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        .filter(|t| !t.is_empty())
}

pub fn set_cookie(resp: &reqwest::Response) -> Option<String> {
    resp.headers().get(SET_COOKIE).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

pub fn example_booking() -> Value {
    json!({
        "location": "nida",
        "date": "2025-08-01T18:00:00Z",
        "theme": "disco",
        "time": "18:00",
        "guestCount": 4,
        "basePrice": 100,
        "totalPrice": 100,
        "contactInfo": {"name": "Jonas K", "email": "j@example.com", "phone": "+37061234567"}
    })
}
