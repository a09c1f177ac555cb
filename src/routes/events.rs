use crate::auth::AuthenticatedUser;
use crate::db::models::{DonorStatus, Event, EventStatus, ReviewStatus};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize, Default)]
pub struct EventPayload {
    pub name: Option<String>,
    pub event_type: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub capacity: Option<i64>,
    pub focus: Option<String>,
    pub criteria_min_giving_level: Option<f64>,
    pub list_generation_date: Option<NaiveDate>,
    pub review_deadline: Option<NaiveDate>,
    pub invitation_date: Option<NaiveDate>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct AddDonorsRequest {
    #[serde(alias = "donorIds")]
    pub donor_ids: Vec<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
    #[serde(alias = "excludeReason")]
    pub exclude_reason: Option<String>,
    pub comments: Option<String>,
}

#[derive(Deserialize)]
pub struct ReviewStatusOverrideRequest {
    #[serde(alias = "reviewStatus")]
    pub review_status: String,
}

pub async fn list_events(State(state): State<AppState>, _user: AuthenticatedUser) -> impl IntoResponse {
    match crate::db::list_events(&state.db).await {
        Ok(events) => AxumJson(json!({ "events": events })).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<EventPayload>,
) -> impl IntoResponse {
    let Some(name) = payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Event name is required").into_response();
    };
    let capacity = payload.capacity.unwrap_or(0);
    if capacity <= 0 {
        return (StatusCode::BAD_REQUEST, "Capacity must be a positive integer").into_response();
    }
    let status = match payload.status.as_deref() {
        None => EventStatus::Planning,
        Some(raw) => match EventStatus::parse(raw) {
            Some(status) => status,
            None => return (StatusCode::BAD_REQUEST, "Invalid event status").into_response(),
        },
    };

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4().to_string(),
        name,
        event_type: payload.event_type,
        event_date: payload.event_date,
        location: payload.location,
        capacity,
        focus: payload.focus,
        criteria_min_giving_level: payload.criteria_min_giving_level,
        list_generation_date: payload.list_generation_date,
        review_deadline: payload.review_deadline,
        invitation_date: payload.invitation_date,
        status,
        deleted: false,
        created_by: user.id,
        created_at: now,
        updated_at: now,
    };

    match crate::db::create_event(&state.db, &event).await {
        Ok(list) => (
            StatusCode::CREATED,
            AxumJson(json!({ "status": "created", "event": event, "donor_list": list })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn get_event(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let event = match crate::db::get_event(&state.db, &id).await {
        Ok(Some(event)) => event,
        Ok(None) => return (StatusCode::NOT_FOUND, "Event not found").into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    match crate::db::get_list_by_event(&state.db, &id).await {
        Ok(list) => AxumJson(json!({ "event": event, "donor_list": list })).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_event(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<EventPayload>,
) -> impl IntoResponse {
    let mut event = match crate::db::get_event(&state.db, &id).await {
        Ok(Some(event)) => event,
        Ok(None) => return (StatusCode::NOT_FOUND, "Event not found").into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return (StatusCode::BAD_REQUEST, "Event name cannot be empty").into_response();
        }
        event.name = name;
    }
    if let Some(capacity) = payload.capacity {
        if capacity <= 0 {
            return (StatusCode::BAD_REQUEST, "Capacity must be a positive integer").into_response();
        }
        event.capacity = capacity;
    }
    if let Some(raw) = payload.status {
        match EventStatus::parse(&raw) {
            Some(status) => event.status = status,
            None => return (StatusCode::BAD_REQUEST, "Invalid event status").into_response(),
        }
    }
    if payload.event_type.is_some() {
        event.event_type = payload.event_type;
    }
    if payload.event_date.is_some() {
        event.event_date = payload.event_date;
    }
    if payload.location.is_some() {
        event.location = payload.location;
    }
    if payload.focus.is_some() {
        event.focus = payload.focus;
    }
    if payload.criteria_min_giving_level.is_some() {
        event.criteria_min_giving_level = payload.criteria_min_giving_level;
    }
    if payload.list_generation_date.is_some() {
        event.list_generation_date = payload.list_generation_date;
    }
    if payload.review_deadline.is_some() {
        event.review_deadline = payload.review_deadline;
    }
    if payload.invitation_date.is_some() {
        event.invitation_date = payload.invitation_date;
    }

    match crate::db::update_event(&state.db, &event).await {
        Ok(true) => AxumJson(json!({ "status": "updated", "event": event })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Event not found").into_response(),
        Err(e) => {
            tracing::error!("Update event error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_event(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match crate::db::soft_delete_event(&state.db, &id).await {
        Ok(true) => (StatusCode::OK, "Deleted").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Delete event error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

async fn resolve_list_id(state: &AppState, event_id: &str) -> Result<String, axum::response::Response> {
    match crate::db::get_event(&state.db, event_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err((StatusCode::NOT_FOUND, "Event not found").into_response()),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response());
        }
    }
    match crate::db::get_list_by_event(&state.db, event_id).await {
        Ok(Some(list)) => Ok(list.id),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Donor list not found").into_response()),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response())
        }
    }
}

pub async fn list_event_donors(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let list_id = match resolve_list_id(&state, &event_id).await {
        Ok(list_id) => list_id,
        Err(response) => return response,
    };
    match crate::db::list_event_donors(&state.db, &list_id).await {
        Ok(entries) => AxumJson(json!({ "donors": entries })).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Bulk add donors to the event's list. Donors flagged excluded or deceased
/// come in as AutoExcluded regardless of the requested status; everyone else
/// gets the requested status (default Pending).
pub async fn add_event_donors(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<AddDonorsRequest>,
) -> impl IntoResponse {
    let requested = match payload.status.as_deref() {
        None => DonorStatus::Pending,
        Some(raw) => match DonorStatus::parse(raw) {
            Some(status) if status.is_user_settable() => status,
            _ => return (StatusCode::BAD_REQUEST, "Invalid status").into_response(),
        },
    };
    if payload.donor_ids.is_empty() {
        return (StatusCode::BAD_REQUEST, "donor_ids must not be empty").into_response();
    }

    let list_id = match resolve_list_id(&state, &event_id).await {
        Ok(list_id) => list_id,
        Err(response) => return response,
    };

    let mut batch = Vec::with_capacity(payload.donor_ids.len());
    for donor_id in &payload.donor_ids {
        let donor = match crate::db::get_donor(&state.db, donor_id).await {
            Ok(Some(donor)) => donor,
            Ok(None) => {
                return (StatusCode::NOT_FOUND, format!("Donor {} not found", donor_id)).into_response()
            }
            Err(e) => {
                tracing::error!("DB Query Error: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
            }
        };
        let status = if donor.excluded || donor.deceased {
            DonorStatus::AutoExcluded
        } else {
            requested
        };
        batch.push((donor.id, status));
    }

    match crate::db::add_event_donors(&state.db, &list_id, &batch).await {
        Ok(added) => {
            let list = crate::db::get_list_by_event(&state.db, &event_id).await.ok().flatten();
            AxumJson(json!({ "added": added, "donor_list": list })).into_response()
        }
        Err(e) => {
            tracing::error!("Bulk add error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn remove_event_donor(
    Path((event_id, donor_id)): Path<(String, String)>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let list_id = match resolve_list_id(&state, &event_id).await {
        Ok(list_id) => list_id,
        Err(response) => return response,
    };
    match crate::db::remove_event_donor(&state.db, &list_id, &donor_id).await {
        Ok(true) => (StatusCode::OK, "Removed").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Donor is not on this list").into_response(),
        Err(e) => {
            tracing::error!("Remove event donor error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Reviewer decision on one list entry. AutoExcluded is reserved for the
/// system and rejected here.
pub async fn set_event_donor_status(
    Path((event_id, donor_id)): Path<(String, String)>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<StatusChangeRequest>,
) -> impl IntoResponse {
    let status = match DonorStatus::parse(&payload.status) {
        Some(status) if status.is_user_settable() => status,
        Some(_) => {
            return (StatusCode::BAD_REQUEST, "AutoExcluded is reserved for system assignment")
                .into_response()
        }
        None => return (StatusCode::BAD_REQUEST, "Invalid status").into_response(),
    };

    let list_id = match resolve_list_id(&state, &event_id).await {
        Ok(list_id) => list_id,
        Err(response) => return response,
    };

    match crate::db::set_event_donor_status(
        &state.db,
        &list_id,
        &donor_id,
        status,
        payload.exclude_reason,
        payload.comments,
        &user.id,
    )
    .await
    {
        Ok(Some(entry)) => {
            let list = crate::db::get_list_by_event(&state.db, &event_id).await.ok().flatten();
            AxumJson(json!({ "entry": entry, "donor_list": list })).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Donor is not on this list").into_response(),
        Err(e) => {
            tracing::error!("Status change error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Full recount from the member rows; the recovery path when counters drift.
pub async fn recompute_list(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let list_id = match resolve_list_id(&state, &event_id).await {
        Ok(list_id) => list_id,
        Err(response) => return response,
    };
    match crate::db::recompute_list_stats(&state.db, &list_id).await {
        Ok(list) => AxumJson(json!({ "donor_list": list })).into_response(),
        Err(e) => {
            tracing::error!("Recompute error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Administrative override; intentionally not checked against the member rows.
pub async fn override_review_status(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<ReviewStatusOverrideRequest>,
) -> impl IntoResponse {
    let Some(status) = ReviewStatus::parse(&payload.review_status) else {
        return (StatusCode::BAD_REQUEST, "Invalid review status").into_response();
    };
    let list_id = match resolve_list_id(&state, &event_id).await {
        Ok(list_id) => list_id,
        Err(response) => return response,
    };
    match crate::db::override_review_status(&state.db, &list_id, status).await {
        Ok(true) => AxumJson(json!({ "status": "updated", "review_status": status })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Donor list not found").into_response(),
        Err(e) => {
            tracing::error!("Review status override error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
