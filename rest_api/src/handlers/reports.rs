// rest_api/src/handlers/reports.rs

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use lib::services::{ClassStat, ReportFilter, VaccineStat};

use super::page_from;
use crate::{AppState, RestApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub vaccine_name: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

// Accepts either a full RFC 3339 timestamp or a plain calendar date.
fn parse_date(value: &str) -> Result<DateTime<Utc>, RestApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        .map_err(|_| RestApiError::BadRequest(format!("Invalid date format: {}", value)))
}

// Handler for GET /api/reports
pub async fn generate_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Value>, RestApiError> {
    let filter = ReportFilter {
        vaccine_name: query.vaccine_name,
        class_name: query.class_name,
        from_date: query.from_date.as_deref().map(parse_date).transpose()?,
        to_date: query.to_date.as_deref().map(parse_date).transpose()?,
    };
    let paged = state
        .reports
        .generate(&filter, page_from(query.page, query.limit))
        .await?;
    Ok(Json(json!({
        "report": paged.items,
        "total": paged.total,
        "totalPages": paged.total_pages,
        "currentPage": paged.current_page,
    })))
}

// Handler for GET /api/reports/vaccines
pub async fn available_vaccines(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, RestApiError> {
    Ok(Json(state.reports.available_vaccines().await?))
}

// Handler for GET /api/reports/vaccine-stats
pub async fn vaccine_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<VaccineStat>>, RestApiError> {
    Ok(Json(state.reports.vaccine_stats().await?))
}

// Handler for GET /api/reports/class-stats
pub async fn class_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassStat>>, RestApiError> {
    Ok(Json(state.reports.class_stats().await?))
}
