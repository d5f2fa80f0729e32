// lib/src/services/dashboard.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use models::{Drive, DriveStatus, PortalResult};

use crate::storage_engine::EntityStore;

use super::reports::{percentage, ReportService, VaccineStat};

/// Aggregate figures for the landing dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: u64,
    pub vaccinated_students: u64,
    pub vaccination_percentage: u32,
    pub upcoming_drives: Vec<Drive>,
    pub recent_drives: Vec<Drive>,
    pub vaccine_stats: Vec<VaccineStat>,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn EntityStore>,
    reports: ReportService,
}

impl DashboardService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let reports = ReportService::new(store.clone());
        DashboardService { store, reports }
    }

    pub async fn stats(&self) -> PortalResult<DashboardStats> {
        let students = self.store.all_students().await?;
        let total_students = students.len() as u64;
        let vaccinated_students = students.iter().filter(|s| s.is_vaccinated()).count() as u64;

        let now = Utc::now();
        let window = Duration::days(30);
        let drives = self.store.all_drives().await?;

        let mut upcoming_drives: Vec<Drive> = drives
            .iter()
            .filter(|d| d.status == DriveStatus::Scheduled && d.date >= now && d.date <= now + window)
            .cloned()
            .collect();
        upcoming_drives.sort_by_key(|d| d.date);

        let mut recent_drives: Vec<Drive> = drives
            .iter()
            .filter(|d| d.status == DriveStatus::Completed && d.date >= now - window && d.date <= now)
            .cloned()
            .collect();
        recent_drives.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(DashboardStats {
            total_students,
            vaccinated_students,
            vaccination_percentage: percentage(vaccinated_students, total_students),
            upcoming_drives,
            recent_drives,
            vaccine_stats: self.reports.vaccine_stats().await?,
        })
    }
}
