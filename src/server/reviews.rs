//! Review endpoints. Listings never fail on an unreachable store; they fall back
//! to the sample set and say so with `fallback: true`.

use axum::extract::{rejection::JsonRejection, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::reviews::{self, ReviewStatus};

use super::{json_body, AdminApi, AppState};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModeratePayload { pub status: String }

fn parse_status(raw: &str) -> AppResult<ReviewStatus> {
    ReviewStatus::parse(raw).ok_or_else(|| AppError::user("invalid_status", "Nežinoma atsiliepimo būsena."))
}

fn review_not_found() -> AppError {
    AppError::not_found("review_not_found", "Atsiliepimas nerastas.")
}

pub async fn public_list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut listing = reviews::list_public(state.store.as_ref())?;
    for r in listing.reviews.iter_mut() {
        r.author_email.clear();
    }
    Ok(Json(listing))
}

/// Anyone may submit; the review waits for moderation.
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let raw = json_body(body)?;
    let new = reviews::validate(&raw).map_err(AppError::validation)?;
    let review = reviews::submit(state.store.as_ref(), new)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "review": review, "message": "Ačiū! Atsiliepimas bus paskelbtas po peržiūros."})),
    ))
}

pub async fn admin_list(
    State(state): State<AppState>,
    AdminApi(_admin): AdminApi,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(s) => Some(parse_status(s)?),
    };
    Ok(Json(reviews::list_admin(state.store.as_ref(), status)?))
}

pub async fn moderate(
    State(state): State<AppState>,
    AdminApi(admin): AdminApi,
    Path(id): Path<String>,
    body: Result<Json<ModeratePayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = json_body(body)?;
    let status = parse_status(&payload.status)?;
    let review = reviews::moderate(state.store.as_ref(), &id, status)?.ok_or_else(review_not_found)?;
    tracing::info!(target: "picnic::reviews", "moderated by uid={}", admin.uid);
    Ok(Json(json!({"success": true, "review": review})))
}

pub async fn delete(
    State(state): State<AppState>,
    AdminApi(_admin): AdminApi,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !reviews::delete(state.store.as_ref(), &id)? {
        return Err(review_not_found());
    }
    Ok(Json(json!({"success": true})))
}
