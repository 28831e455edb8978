//! Auth endpoints: id-token exchange, password login, signup, logout and `me`.

use axum::extract::{rejection::JsonRejection, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::AppResult;
use crate::identity::{AuthFailure, NewUser, Session, User};
use crate::store::{DocumentStore, Query, StoreResult};

use super::{clear_session_cookie, json_body, parse_cookie, session_cookie, AppState, CurrentUser, SESSION_COOKIE};

/// Collection holding the profile mirror of identity provider accounts.
pub const USERS: &str = "users";

const MSG_LOGGED_OUT: &str = "Sėkmingai atsijungėte.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload { pub id_token: String }

#[derive(Debug, Deserialize)]
pub struct LoginPayload { pub email: String, pub password: String }

fn signed_in(state: &AppState, sess: Session, status: StatusCode) -> AppResult<impl IntoResponse> {
    let cookie = session_cookie(&sess.token, state.sessions.ttl(), state.config.secure_cookies)?;
    Ok((status, [(header::SET_COOKIE, cookie)], Json(json!({"success": true, "user": sess.user}))))
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<SessionPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = json_body(body)?;
    let sess = state.sessions.create_session(state.provider.as_ref(), payload.id_token.trim()).await?;
    info!(target: "picnic::auth", "session created from id token uid={}", sess.user.uid);
    signed_in(&state, sess, StatusCode::OK)
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = json_body(body)?;
    let email = payload.email.trim();
    let record = match state.provider.verify_credentials(email, &payload.password).await {
        Ok(r) => r,
        Err(e) => {
            info!(target: "picnic::auth", "login failed email={} reason={}", email, e);
            return Err(e.into());
        }
    };
    if record.disabled {
        return Err(AuthFailure::Disabled.into());
    }
    let sess = state.sessions.issue(record.user)?;
    info!(target: "picnic::auth", "login ok uid={} backend={}", sess.user.uid, state.provider.backend_name());
    signed_in(&state, sess, StatusCode::OK)
}

pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let mut req = json_body(body)?;
    req.email = req.email.trim().to_string();
    req.display_name = req.display_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let record = state.provider.create_user(&req).await?;
    if let Err(e) = mirror_profile(state.store.as_ref(), &record.user) {
        warn!(target: "picnic::store", "profile mirror failed uid={}: {}", record.user.uid, e);
    }
    let sess = state.sessions.issue(record.user)?;
    info!(target: "picnic::auth", "signup ok uid={}", sess.user.uid);
    signed_in(&state, sess, StatusCode::CREATED)
}

/// Always succeeds; a missing or stale cookie is simply cleared again.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(tok) = parse_cookie(&headers, SESSION_COOKIE) {
        if state.sessions.remove(&tok) {
            info!(target: "picnic::auth", "logout");
        }
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(state.config.secure_cookies))],
        Json(json!({"success": true, "message": MSG_LOGGED_OUT})),
    )
}

pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(json!({ "user": user }))
}

/// Upsert the profile record for `user`, keyed by its uid field.
pub fn mirror_profile(store: &dyn DocumentStore, user: &User) -> StoreResult<()> {
    let users = store.collection(USERS);
    let mut data: Map<String, Value> = match serde_json::to_value(user)? {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    data.insert("updatedAt".into(), json!(Utc::now()));
    let existing = users.query(&Query::new().where_eq("uid", user.uid.as_str()).limit(1))?;
    match existing.into_iter().next() {
        Some(doc) => { users.update(&doc.id, data)?; }
        None => {
            data.insert("createdAt".into(), json!(Utc::now()));
            users.add(data)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use crate::store::MemoryStore;

    fn user(role: Role) -> User {
        User { uid: "u1".into(), email: "ona@example.com".into(), display_name: Some("Ona".into()), role }
    }

    #[test]
    fn profile_mirror_upserts_by_uid() {
        let store = MemoryStore::new();
        mirror_profile(&store, &user(Role::User)).unwrap();
        mirror_profile(&store, &user(Role::Admin)).unwrap();
        let store: &dyn DocumentStore = &store;
        let docs = store.collection(USERS).all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("role"), Some("admin"));
        assert_eq!(docs[0].data["isAdmin"], json!(true));
        assert!(docs[0].data.contains_key("createdAt"));
    }

    #[test]
    fn profile_mirror_reports_an_offline_store() {
        let store = MemoryStore::new();
        store.set_online(false);
        assert!(mirror_profile(&store, &user(Role::User)).is_err());
    }
}
