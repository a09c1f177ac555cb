use crate::auth::AuthenticatedUser;
use crate::progress::CancelOutcome;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use serde_json::json;

pub async fn get_operation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match state.progress.get_progress(&id) {
        Some(payload) => AxumJson(payload).into_response(),
        None => (StatusCode::NOT_FOUND, "Operation not found").into_response(),
    }
}

pub async fn cancel_operation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    match state.progress.cancel_operation(&id, &user.id) {
        CancelOutcome::Cancelled => {
            AxumJson(json!({ "success": true, "operationId": id, "status": "cancelled" })).into_response()
        }
        CancelOutcome::NotFound => (StatusCode::NOT_FOUND, "Operation not found").into_response(),
        CancelOutcome::Forbidden => {
            (StatusCode::FORBIDDEN, "Operation belongs to another user").into_response()
        }
        CancelOutcome::AlreadyFinished => {
            (StatusCode::CONFLICT, "Operation already finished").into_response()
        }
    }
}
