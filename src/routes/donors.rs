use crate::auth::AuthenticatedUser;
use crate::db::models::Donor;
use crate::import;
use crate::AppState;
use axum::{
    extract::{Json, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize, Default)]
pub struct DonorPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_name: Option<String>,
    pub pmm: Option<String>,
    pub smm: Option<String>,
    pub vmm: Option<String>,
    pub total_donations: Option<f64>,
    pub total_pledges: Option<f64>,
    pub largest_gift: Option<f64>,
    pub last_gift_amount: Option<f64>,
    pub first_gift_date: Option<NaiveDate>,
    pub last_gift_date: Option<NaiveDate>,
    pub excluded: Option<bool>,
    pub deceased: Option<bool>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub contact_preference: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn monetary_fields_valid(payload: &DonorPayload) -> bool {
    [
        payload.total_donations,
        payload.total_pledges,
        payload.largest_gift,
        payload.last_gift_amount,
    ]
    .iter()
    .flatten()
    .all(|v| *v >= 0.0)
}

pub async fn list_donors(State(state): State<AppState>, _user: AuthenticatedUser) -> impl IntoResponse {
    match crate::db::list_donors(&state.db).await {
        Ok(donors) => AxumJson(json!({ "donors": donors })).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn get_donor(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match crate::db::get_donor(&state.db, &id).await {
        Ok(Some(donor)) => AxumJson(json!({ "donor": donor })).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Donor not found").into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_donor(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<DonorPayload>,
) -> impl IntoResponse {
    let first_name = non_empty(payload.first_name.clone());
    let last_name = non_empty(payload.last_name.clone());
    let organization_name = non_empty(payload.organization_name.clone());
    if first_name.is_none() && last_name.is_none() && organization_name.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            "At least one of first_name, last_name, organization_name is required",
        )
            .into_response();
    }
    if !monetary_fields_valid(&payload) {
        return (StatusCode::BAD_REQUEST, "Monetary fields must be non-negative").into_response();
    }

    let now = Utc::now();
    let donor = Donor {
        id: Uuid::new_v4().to_string(),
        first_name,
        last_name,
        organization_name,
        pmm: non_empty(payload.pmm),
        smm: non_empty(payload.smm),
        vmm: non_empty(payload.vmm),
        total_donations: payload.total_donations.unwrap_or(0.0),
        total_pledges: payload.total_pledges.unwrap_or(0.0),
        largest_gift: payload.largest_gift.unwrap_or(0.0),
        last_gift_amount: payload.last_gift_amount.unwrap_or(0.0),
        first_gift_date: payload.first_gift_date,
        last_gift_date: payload.last_gift_date,
        excluded: payload.excluded.unwrap_or(false),
        deceased: payload.deceased.unwrap_or(false),
        email: non_empty(payload.email),
        phone: non_empty(payload.phone),
        address: non_empty(payload.address),
        city: non_empty(payload.city),
        contact_preference: non_empty(payload.contact_preference),
        tags: payload.tags.unwrap_or_default(),
        notes: non_empty(payload.notes),
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = crate::db::create_donor(&state.db, &donor).await {
        tracing::error!("DB Error: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }
    (StatusCode::CREATED, AxumJson(json!({ "status": "created", "donor": donor }))).into_response()
}

pub async fn update_donor(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<DonorPayload>,
) -> impl IntoResponse {
    let mut donor = match crate::db::get_donor(&state.db, &id).await {
        Ok(Some(donor)) => donor,
        Ok(None) => return (StatusCode::NOT_FOUND, "Donor not found").into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if !monetary_fields_valid(&payload) {
        return (StatusCode::BAD_REQUEST, "Monetary fields must be non-negative").into_response();
    }

    if payload.first_name.is_some() {
        donor.first_name = non_empty(payload.first_name);
    }
    if payload.last_name.is_some() {
        donor.last_name = non_empty(payload.last_name);
    }
    if payload.organization_name.is_some() {
        donor.organization_name = non_empty(payload.organization_name);
    }
    if donor.first_name.is_none() && donor.last_name.is_none() && donor.organization_name.is_none() {
        return (StatusCode::BAD_REQUEST, "Donor must keep at least one identity field").into_response();
    }
    if payload.pmm.is_some() {
        donor.pmm = non_empty(payload.pmm);
    }
    if payload.smm.is_some() {
        donor.smm = non_empty(payload.smm);
    }
    if payload.vmm.is_some() {
        donor.vmm = non_empty(payload.vmm);
    }
    if let Some(v) = payload.total_donations {
        donor.total_donations = v;
    }
    if let Some(v) = payload.total_pledges {
        donor.total_pledges = v;
    }
    if let Some(v) = payload.largest_gift {
        donor.largest_gift = v;
    }
    if let Some(v) = payload.last_gift_amount {
        donor.last_gift_amount = v;
    }
    if payload.first_gift_date.is_some() {
        donor.first_gift_date = payload.first_gift_date;
    }
    if payload.last_gift_date.is_some() {
        donor.last_gift_date = payload.last_gift_date;
    }
    if let Some(v) = payload.excluded {
        donor.excluded = v;
    }
    if let Some(v) = payload.deceased {
        donor.deceased = v;
    }
    if payload.email.is_some() {
        donor.email = non_empty(payload.email);
    }
    if payload.phone.is_some() {
        donor.phone = non_empty(payload.phone);
    }
    if payload.address.is_some() {
        donor.address = non_empty(payload.address);
    }
    if payload.city.is_some() {
        donor.city = non_empty(payload.city);
    }
    if payload.contact_preference.is_some() {
        donor.contact_preference = non_empty(payload.contact_preference);
    }
    if let Some(tags) = payload.tags {
        donor.tags = tags;
    }
    if payload.notes.is_some() {
        donor.notes = non_empty(payload.notes);
    }

    match crate::db::update_donor(&state.db, &donor).await {
        Ok(true) => AxumJson(json!({ "status": "updated", "donor": donor })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Donor not found").into_response(),
        Err(e) => {
            tracing::error!("Update donor error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Hard delete; the db layer removes event list memberships and fixes up the
/// affected lists' counters in the same transaction.
pub async fn delete_donor(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match crate::db::delete_donor(&state.db, &id).await {
        Ok(true) => (StatusCode::OK, "Deleted").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Delete donor error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Bulk import upload. Only a missing file or an unparseable upload fails the
/// request; row-level problems are reported through the operation result.
pub async fn import_donors(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
                    continue;
                };
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some((file_name, bytes.to_vec()));
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Upload read failed: {}", e);
                        return (StatusCode::BAD_REQUEST, "Failed to read uploaded file").into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart error: {}", e);
                return (StatusCode::BAD_REQUEST, "Invalid multipart request").into_response();
            }
        }
    }

    let Some((file_name, data)) = upload else {
        return (StatusCode::BAD_REQUEST, "No file attached").into_response();
    };

    let rows = match import::parse_upload(&file_name, &data) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("Rejected import upload {}: {}", file_name, e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let (_, op_id) = state.progress.create_operation("donor_import", &user.id, rows.len());
    let pool = state.db.clone();
    let tracker = state.progress.clone();
    let op = op_id.clone();
    tokio::spawn(async move {
        match import::run_import(&pool, &rows, Some((&tracker, op.as_str()))).await {
            Ok(summary) => {
                tracing::info!(
                    "Import {} finished: {} imported, {} updated, {} skipped",
                    op,
                    summary.imported,
                    summary.updated,
                    summary.skipped
                );
                tracker.complete(&op, serde_json::to_value(&summary).unwrap_or_default());
            }
            Err(e) => {
                tracing::error!("Import {} failed: {}", op, e);
                tracker.fail(&op, &e.to_string());
            }
        }
    });

    (StatusCode::OK, AxumJson(json!({ "success": true, "operationId": op_id }))).into_response()
}
