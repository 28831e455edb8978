use axum::extract::{rejection::JsonRejection, Path, State};
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{AuthFailure, IdentityError, Role};

use super::auth::mirror_profile;
use super::{json_body, AdminApi, AdminPage, AppState};

#[derive(Debug, Deserialize)]
pub struct RolePayload { pub role: String }

#[derive(Debug, Deserialize)]
pub struct DisabledPayload { pub disabled: bool }

// An unknown target uid is a missing resource, not a failed sign-in.
fn target_error(err: IdentityError) -> AppError {
    match err {
        IdentityError::Auth(AuthFailure::NotFound) => {
            AppError::not_found("user_not_found", "Vartotojas su šiuo identifikatoriumi nerastas.")
        }
        other => other.into(),
    }
}

/// Change a user's role at the provider. Every live session of that user is
/// revoked so the next request re-authenticates with the new claim.
pub async fn set_role(
    State(state): State<AppState>,
    AdminApi(admin): AdminApi,
    Path(uid): Path<String>,
    body: Result<Json<RolePayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = json_body(body)?;
    let role = Role::parse(&payload.role).ok_or_else(|| AppError::user("invalid_role", "Nežinomas vaidmuo."))?;
    let record = state.provider.set_role(&uid, role).await.map_err(target_error)?;
    let revoked = state.sessions.revoke_user(&uid);
    if let Err(e) = mirror_profile(state.store.as_ref(), &record.user) {
        warn!(target: "picnic::store", "profile mirror failed uid={}: {}", uid, e);
    }
    info!(target: "picnic::auth", "role changed uid={} role={} by={} revoked_sessions={}", uid, role.as_str(), admin.uid, revoked);
    Ok(Json(json!({"success": true, "user": record.user, "revokedSessions": revoked})))
}

/// Enable or disable sign-in. Disabling also drops the user's live sessions.
pub async fn set_disabled(
    State(state): State<AppState>,
    AdminApi(admin): AdminApi,
    Path(uid): Path<String>,
    body: Result<Json<DisabledPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = json_body(body)?;
    let record = state.provider.set_disabled(&uid, payload.disabled).await.map_err(target_error)?;
    let revoked = if record.disabled { state.sessions.revoke_user(&uid) } else { 0 };
    info!(target: "picnic::auth", "account disabled={} uid={} by={} revoked_sessions={}", record.disabled, uid, admin.uid, revoked);
    Ok(Json(json!({"success": true, "user": record.user, "disabled": record.disabled, "revokedSessions": revoked})))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

pub async fn dashboard(AdminPage(admin): AdminPage) -> Html<String> {
    let name = admin.display_name.as_deref().unwrap_or(&admin.email);
    Html(format!(
        "<!doctype html><html lang=\"lt\"><head><meta charset=\"utf-8\"><title>Administravimas</title></head>\
         <body><h1>Administravimas</h1><p>Prisijungta kaip {}</p>\
         <ul><li><a href=\"/api/admin/bookings\">Rezervacijos</a></li><li><a href=\"/api/admin/reviews\">Atsiliepimai</a></li></ul>\
         </body></html>",
        escape_html(name)
    ))
}
