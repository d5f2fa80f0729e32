// rest_api/src/handlers/drives.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use lib::DriveFilter;
use models::{Drive, DriveStatus, DriveUpdate, NewDrive, PortalError, RecordStatus};

use super::page_from;
use crate::{AdminContext, AppState, RestApiError};

#[derive(Debug, Deserialize)]
pub struct DriveListQuery {
    pub status: Option<String>,
    pub upcoming: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DriveStudentsQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

fn parse_drive_status(value: &str) -> Result<DriveStatus, RestApiError> {
    match value {
        "Scheduled" => Ok(DriveStatus::Scheduled),
        "Completed" => Ok(DriveStatus::Completed),
        "Cancelled" => Ok(DriveStatus::Cancelled),
        other => Err(RestApiError::Portal(PortalError::Validation(format!(
            "Invalid drive status: {}",
            other
        )))),
    }
}

fn parse_record_status(value: &str) -> Result<RecordStatus, RestApiError> {
    match value {
        "Scheduled" => Ok(RecordStatus::Scheduled),
        "Completed" => Ok(RecordStatus::Completed),
        "Missed" => Ok(RecordStatus::Missed),
        other => Err(RestApiError::Portal(PortalError::Validation(format!(
            "Invalid vaccination status: {}",
            other
        )))),
    }
}

// Handler for GET /api/drives
pub async fn list_drives(
    State(state): State<AppState>,
    Query(query): Query<DriveListQuery>,
) -> Result<Json<Value>, RestApiError> {
    let status = query.status.as_deref().map(parse_drive_status).transpose()?;
    let filter = DriveFilter {
        status,
        upcoming: query.upcoming.as_deref() == Some("true"),
    };
    let paged = state.drives.list(&filter, page_from(query.page, query.limit)).await?;
    Ok(Json(json!({
        "drives": paged.items,
        "total": paged.total,
        "totalPages": paged.total_pages,
        "currentPage": paged.current_page,
    })))
}

// Handler for GET /api/drives/:id
pub async fn get_drive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Drive>, RestApiError> {
    Ok(Json(state.drives.get(id).await?))
}

// Handler for POST /api/drives
pub async fn create_drive(
    State(state): State<AppState>,
    admin: axum::Extension<AdminContext>,
    Json(mut payload): Json<NewDrive>,
) -> Result<(StatusCode, Json<Drive>), RestApiError> {
    if payload.created_by.is_none() {
        payload.created_by = Some(admin.username.clone());
    }
    let drive = state.drives.create(payload).await?;
    Ok((StatusCode::CREATED, Json(drive)))
}

// Handler for PUT /api/drives/:id
pub async fn update_drive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriveUpdate>,
) -> Result<Json<Drive>, RestApiError> {
    Ok(Json(state.drives.update(id, payload).await?))
}

// Handler for DELETE /api/drives/:id
pub async fn delete_drive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, RestApiError> {
    state.drives.delete(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Vaccination drive deleted successfully",
    })))
}

// Handler for POST /api/drives/:id/cancel
pub async fn cancel_drive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, RestApiError> {
    let outcome = state.drives.cancel(id).await?;
    Ok(Json(json!({
        "message": "Vaccination drive cancelled successfully",
        "drive": outcome.drive,
        "recordsMissed": outcome.records_missed,
    })))
}

// Handler for POST /api/drives/:id/complete
pub async fn complete_drive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, RestApiError> {
    let outcome = state.drives.complete(id).await?;
    Ok(Json(json!({
        "message": "Vaccination drive marked as completed successfully",
        "drive": outcome.drive,
        "recordsMissed": outcome.records_missed,
    })))
}

// Handler for GET /api/drives/:id/students
pub async fn drive_students(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DriveStudentsQuery>,
) -> Result<Json<Value>, RestApiError> {
    let status = query.status.as_deref().map(parse_record_status).transpose()?;
    let paged = state
        .drives
        .students_for_drive(id, status, page_from(query.page, query.limit))
        .await?;
    Ok(Json(json!({
        "students": paged.items,
        "total": paged.total,
        "totalPages": paged.total_pages,
        "currentPage": paged.current_page,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_known_statuses_and_reject_unknown() {
        assert_eq!(parse_drive_status("Scheduled").unwrap(), DriveStatus::Scheduled);
        assert_eq!(parse_drive_status("Cancelled").unwrap(), DriveStatus::Cancelled);
        assert!(parse_drive_status("scheduled").is_err());
        assert_eq!(parse_record_status("Missed").unwrap(), RecordStatus::Missed);
        assert!(parse_record_status("Done").is_err());
    }
}
