// rest_api/src/handlers/students.rs

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use lib::{StudentFilter, VaccinationStatusFilter};
use models::{NewStudent, Student, StudentImportRow, StudentUpdate};

use super::page_from;
use crate::{AppState, RestApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListQuery {
    pub name: Option<String>,
    pub student_id: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub vaccination_status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinateRequest {
    pub drive_id: Uuid,
}

// Handler for GET /api/students
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<StudentListQuery>,
) -> Result<Json<Value>, RestApiError> {
    let filter = StudentFilter {
        name: query.name,
        student_id: query.student_id,
        class_name: query.class_name,
        // unknown values impose no constraint
        vaccination_status: query
            .vaccination_status
            .as_deref()
            .and_then(VaccinationStatusFilter::parse),
    };
    let paged = state
        .students
        .list(&filter, page_from(query.page, query.limit))
        .await?;
    Ok(Json(json!({
        "students": paged.items,
        "total": paged.total,
        "totalPages": paged.total_pages,
        "currentPage": paged.current_page,
    })))
}

// Handler for GET /api/students/:id
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Student>, RestApiError> {
    Ok(Json(state.students.get(id).await?))
}

// Handler for POST /api/students
pub async fn create_student(
    State(state): State<AppState>,
    Json(payload): Json<NewStudent>,
) -> Result<(axum::http::StatusCode, Json<Student>), RestApiError> {
    let student = state.students.create(payload).await?;
    Ok((axum::http::StatusCode::CREATED, Json(student)))
}

// Handler for PUT /api/students/:id
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StudentUpdate>,
) -> Result<Json<Student>, RestApiError> {
    Ok(Json(state.students.update(id, payload).await?))
}

// Handler for DELETE /api/students/:id
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, RestApiError> {
    state.students.delete(id).await?;
    Ok(Json(json!({ "message": "Student deleted successfully" })))
}

// Handler for POST /api/students/:id/vaccinate
pub async fn vaccinate_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VaccinateRequest>,
) -> Result<Json<Value>, RestApiError> {
    let outcome = state.vaccination.vaccinate(id, payload.drive_id).await?;
    Ok(Json(json!({
        "message": "Student vaccinated successfully",
        "student": outcome.student,
        "drive": outcome.drive,
    })))
}

// Handler for POST /api/students/import; the body is the raw CSV text.
pub async fn import_students(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, RestApiError> {
    let rows = parse_csv_rows(&body)?;
    let outcome = state.students.import(rows).await?;
    let errors = if outcome.errors.is_empty() {
        Value::Null
    } else {
        json!(outcome.errors)
    };
    Ok(Json(json!({
        "message": format!("Imported {} students successfully", outcome.imported.len()),
        "imported": outcome.imported.len(),
        "errors": errors,
    })))
}

fn parse_csv_rows(body: &str) -> Result<Vec<StudentImportRow>, RestApiError> {
    if body.trim().is_empty() {
        return Err(RestApiError::BadRequest("Please upload a CSV file".to_string()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());
    reader
        .deserialize()
        .map(|row| row.map_err(|e| RestApiError::BadRequest(format!("Failed to process CSV: {}", e))))
        .collect()
}
