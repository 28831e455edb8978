use axum::extract::{rejection::JsonRejection, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::booking::{self, ValidationOptions};
use crate::error::{AppError, AppResult};

use super::{json_body, AdminApi, AppState, SignedIn};

/// 201 with the stored booking, or 400 listing every invalid field.
pub async fn submit(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let raw = json_body(body)?;
    let opts = ValidationOptions { enforce_price_total: state.config.enforce_price_total };
    let request = match booking::validate(&raw, opts) {
        Ok(r) => r,
        Err(errors) => {
            info!(target: "picnic::booking", "booking rejected uid={} fields={}", user.uid, errors.len());
            return Err(AppError::validation(errors));
        }
    };
    let (doc, record) = booking::accept(state.store.as_ref(), &user, request)?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "id": doc.id, "booking": record}))))
}

pub async fn admin_list(State(state): State<AppState>, AdminApi(_admin): AdminApi) -> AppResult<impl IntoResponse> {
    let bookings = booking::list(state.store.as_ref())?;
    Ok(Json(json!({"total": bookings.len(), "bookings": bookings})))
}
