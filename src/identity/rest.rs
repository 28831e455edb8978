//! Identity Toolkit REST backend (`/v1/accounts:*`).
//!
//! Public calls (`signInWithPassword`, `signUp`, `lookup` by id token) authenticate with
//! the project API key. Account administration (`lookup` by uid/email, `update`) needs
//! an OAuth bearer token for a privileged service account; without one those calls
//! fail as unavailable rather than pretending the account does not exist.

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::provider::{AuthFailure, IdentityError, IdentityProvider};
use super::user::{NewUser, Role, User, UserRecord};

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";

pub struct RestIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    admin_token: Option<String>,
}

/// Read the role claim out of an account's custom attributes JSON.
/// `{"role":"admin"}` is canonical; `{"isAdmin":true}` is accepted from older accounts.
pub fn role_from_custom_attributes(raw: Option<&str>) -> Role {
    let Some(raw) = raw else { return Role::User; };
    let Ok(v) = serde_json::from_str::<Value>(raw) else {
        warn!(target: "picnic::auth", "ignoring malformed customAttributes");
        return Role::User;
    };
    if let Some(role) = v.get("role").and_then(|r| r.as_str()).and_then(Role::parse) {
        return role;
    }
    if v.get("isAdmin").and_then(|b| b.as_bool()).unwrap_or(false) { Role::Admin } else { Role::User }
}

fn record_from_lookup(v: &Value) -> Result<UserRecord, IdentityError> {
    let Some(u) = v.get("users").and_then(|u| u.get(0)) else {
        return Err(AuthFailure::NotFound.into());
    };
    let uid = u.get("localId").and_then(|s| s.as_str())
        .ok_or_else(|| IdentityError::Unavailable("lookup response without localId".into()))?;
    Ok(UserRecord {
        user: User {
            uid: uid.to_string(),
            email: u.get("email").and_then(|s| s.as_str()).unwrap_or_default().to_string(),
            display_name: u.get("displayName").and_then(|s| s.as_str()).map(|s| s.to_string()),
            role: role_from_custom_attributes(u.get("customAttributes").and_then(|s| s.as_str())),
        },
        disabled: u.get("disabled").and_then(|b| b.as_bool()).unwrap_or(false),
    })
}

impl RestIdentityProvider {
    pub fn new(base_url: &str, api_key: &str, admin_token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            admin_token,
        })
    }

    async fn call(&self, method: &str, body: Value, admin: bool) -> Result<Value, IdentityError> {
        let url = format!("{}/v1/accounts:{}?key={}", self.base_url, method, urlencoding::encode(&self.api_key));
        let mut req = self.client.post(&url).json(&body);
        if admin {
            let Some(token) = self.admin_token.as_deref() else {
                return Err(IdentityError::Unavailable(format!("accounts:{method} needs admin credentials")));
            };
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        let status = resp.status();
        let payload: Value = resp.json().await.unwrap_or(Value::Null);
        debug!(target: "picnic::auth", "accounts:{} -> {}", method, status);
        if status.is_success() {
            return Ok(payload);
        }
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(format!("accounts:{method} returned {status}")));
        }
        match payload.get("error").and_then(|e| e.get("message")).and_then(|m| m.as_str()) {
            Some(code) => Err(AuthFailure::from_provider_code(code).into()),
            None if status == StatusCode::TOO_MANY_REQUESTS => Err(AuthFailure::RateLimited.into()),
            None => Err(IdentityError::Unavailable(format!("accounts:{method} returned {status} without error body"))),
        }
    }

    async fn lookup_by_id_token(&self, id_token: &str) -> Result<UserRecord, IdentityError> {
        let v = self.call("lookup", json!({ "idToken": id_token }), false).await?;
        record_from_lookup(&v)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserRecord, IdentityError> {
        let v = self.call(
            "signInWithPassword",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
            false,
        ).await?;
        let id_token = v.get("idToken").and_then(|t| t.as_str())
            .ok_or_else(|| IdentityError::Unavailable("signInWithPassword response without idToken".into()))?;
        let record = self.lookup_by_id_token(id_token).await?;
        if record.disabled {
            return Err(AuthFailure::Disabled.into());
        }
        Ok(record)
    }

    async fn sign_up(&self, req: &NewUser) -> Result<UserRecord, IdentityError> {
        let mut body = json!({ "email": req.email, "password": req.password, "returnSecureToken": true });
        if let Some(name) = req.display_name.as_deref() {
            body["displayName"] = json!(name);
        }
        let v = self.call("signUp", body, false).await?;
        let id_token = v.get("idToken").and_then(|t| t.as_str())
            .ok_or_else(|| IdentityError::Unavailable("signUp response without idToken".into()))?;
        self.lookup_by_id_token(id_token).await
    }

    async fn update_role(&self, uid: &str, role: Role) -> Result<UserRecord, IdentityError> {
        let attrs = json!({ "role": role.as_str() }).to_string();
        self.call("update", json!({ "localId": uid, "customAttributes": attrs }), true).await?;
        let v = self.call("lookup", json!({ "localId": [uid] }), true).await?;
        record_from_lookup(&v)
    }

    async fn update_disabled(&self, uid: &str, disabled: bool) -> Result<UserRecord, IdentityError> {
        self.call("update", json!({ "localId": uid, "disableUser": disabled }), true).await?;
        let v = self.call("lookup", json!({ "localId": [uid] }), true).await?;
        record_from_lookup(&v)
    }
}

impl IdentityProvider for RestIdentityProvider {
    fn backend_name(&self) -> &'static str { "rest" }

    fn verify_credentials<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        self.sign_in(email, password).boxed()
    }

    fn verify_id_token<'a>(&'a self, id_token: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        self.lookup_by_id_token(id_token).boxed()
    }

    fn get_user<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move {
            let v = self.call("lookup", json!({ "localId": [uid] }), true).await?;
            record_from_lookup(&v)
        }.boxed()
    }

    fn get_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        async move {
            let v = self.call("lookup", json!({ "email": [email] }), true).await?;
            record_from_lookup(&v)
        }.boxed()
    }

    fn create_user<'a>(&'a self, req: &'a NewUser) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        self.sign_up(req).boxed()
    }

    fn set_role<'a>(&'a self, uid: &'a str, role: Role) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        self.update_role(uid, role).boxed()
    }

    fn set_disabled<'a>(&'a self, uid: &'a str, disabled: bool) -> BoxFuture<'a, Result<UserRecord, IdentityError>> {
        self.update_disabled(uid, disabled).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_attribute_roles() {
        assert_eq!(role_from_custom_attributes(None), Role::User);
        assert_eq!(role_from_custom_attributes(Some(r#"{"role":"admin"}"#)), Role::Admin);
        assert_eq!(role_from_custom_attributes(Some(r#"{"isAdmin":true}"#)), Role::Admin);
        assert_eq!(role_from_custom_attributes(Some(r#"{"role":"user","isAdmin":true}"#)), Role::User);
        assert_eq!(role_from_custom_attributes(Some("not json")), Role::User);
    }

    #[test]
    fn lookup_parsing() {
        let v = json!({"users":[{"localId":"abc","email":"a@b.lt","displayName":"A","disabled":true,"customAttributes":"{\"role\":\"admin\"}"}]});
        let rec = record_from_lookup(&v).unwrap();
        assert_eq!(rec.user.uid, "abc");
        assert!(rec.user.is_admin());
        assert!(rec.disabled);

        match record_from_lookup(&json!({"kind":"identitytoolkit#GetAccountInfoResponse"})) {
            Err(IdentityError::Auth(AuthFailure::NotFound)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn admin_calls_without_token_are_unavailable() {
        let p = RestIdentityProvider::new("http://127.0.0.1:9", "key", None, Duration::from_secs(1)).unwrap();
        match p.get_user("abc").await {
            Err(IdentityError::Unavailable(msg)) => assert!(msg.contains("admin credentials")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
